//! Entity trait: a typed object mapped to and from one stored document.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Document field that holds the identifier of every mapped entity.
pub const ID_FIELD: &str = "_id";

/// Entity marker + minimal interface.
///
/// Entities are plain serde structs. The identifier is carried in its string
/// form and must serialise under [`ID_FIELD`], e.g.
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct User {
///     #[serde(rename = "_id")]
///     id: String,
///     name: String,
/// }
/// ```
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// String form of the identifier. Empty when the entity has not been stored yet.
    fn id(&self) -> &str;

    fn has_id(&self) -> bool {
        !self.id().is_empty()
    }
}
