use serde_yaml::Value;

/// base YAML Value に overlay YAML Value を再帰的にマージする。
/// マッピング同士はキー単位で再帰し、それ以外は overlay で置き換える。
/// overlay 側の null は「指定なし」とみなし base の値を残す。
pub fn merge_yaml(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_yaml(base_value, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}
