use strum::{Display, EnumString, IntoStaticStr};

/// Represents the Python type of a value.
///
/// The string form is the name CPython prints in error messages
/// (`'float' object cannot be interpreted as an integer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    #[strum(serialize = "NoneType")]
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Range,
    #[strum(serialize = "array.array")]
    Array,
    /// A host-defined object; its name comes from [`PyObject::type_name`](crate::PyObject::type_name).
    Object,
}
