use serde::Serialize;
use serde_json::Value;

/// CallParams は保護対象の呼び出しに渡された引数を、引数名で参照できる形にしたもの。
/// キー式からは `#名前` で読み出す。
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    bindings: Vec<(String, Value)>,
}

impl CallParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// 引数名と値の並びから生成する。長さが異なる場合は短い方に合わせる。
    pub fn from_parts(names: &[&str], values: &[Value]) -> Self {
        Self {
            bindings: names
                .iter()
                .zip(values)
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name.into(), value.into());
        self
    }

    /// 構造体などシリアライズ可能な値を束縛する。ネストしたフィールドは `#order.customer.id` で参照できる。
    pub fn bind_serialized<T: Serialize + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.insert(name.into(), value);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn insert(&mut self, name: String, value: Value) {
        match self.bindings.iter_mut().find(|(bound, _)| *bound == name) {
            Some(slot) => slot.1 = value,
            None => self.bindings.push((name, value)),
        }
    }
}
