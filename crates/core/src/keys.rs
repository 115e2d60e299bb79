//! Backend key layout for object blobs and their metadata companions.

use crate::upload::ObjectId;

/// Key of the object blob: `{data_dir}/{object_id}`.
pub fn object_key(data_dir: &str, object_id: &ObjectId) -> String {
    format!("{}/{}", data_dir, object_id)
}

/// Key of the metadata companion: `{data_dir}/{object_id}.meta`.
///
/// Written only after successful finalize; holds the serialized
/// specification with final etags.
pub fn object_meta_key(data_dir: &str, object_id: &ObjectId) -> String {
    format!("{}/{}.meta", data_dir, object_id)
}

/// Recover the object id from a blob key, if the key lives under `data_dir`
/// and is not a metadata companion.
pub fn object_id_from_key(data_dir: &str, key: &str) -> Option<ObjectId> {
    let rest = key.strip_prefix(data_dir)?.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') || rest.ends_with(".meta") {
        return None;
    }
    Some(ObjectId::from(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = ObjectId::from("0e9a3a9b");
        assert_eq!(object_key("data", &id), "data/0e9a3a9b");
        assert_eq!(object_meta_key("data", &id), "data/0e9a3a9b.meta");
    }

    #[test]
    fn test_object_id_from_key() {
        assert_eq!(
            object_id_from_key("data", "data/0e9a3a9b"),
            Some(ObjectId::from("0e9a3a9b"))
        );
        assert_eq!(object_id_from_key("data", "data/0e9a3a9b.meta"), None);
        assert_eq!(object_id_from_key("data", "other/0e9a3a9b"), None);
        assert_eq!(object_id_from_key("data", "data/nested/key"), None);
    }
}
