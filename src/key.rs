//! Type keys and member signatures.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key identifying a dependency or parameter type.
///
/// Carries the `TypeId` used for lookup and the full type name used for
/// diagnostics and signature strings. Equality and hashing only look at the
/// `TypeId`.
///
/// ```rust
/// use ferrous_fixtures::TypeKey;
///
/// let key = TypeKey::of::<String>();
/// assert_eq!(key, TypeKey::of::<String>());
/// assert_eq!(key.name(), "alloc::string::String");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the type `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name, as reported by `std::any::type_name`.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Helper for creating type keys
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> TypeKey {
    TypeKey::of::<T>()
}

/// Builds the stable signature string of a member.
///
/// The signature is the member name followed by the comma-joined parameter type
/// names in parentheses. The parenthesised part is left out entirely when there
/// are no parameters.
///
/// ```rust
/// use ferrous_fixtures::member_signature;
///
/// assert_eq!(member_signature("tests::Pong", ["tests::Ping"]), "tests::Pong(tests::Ping)");
/// assert_eq!(member_signature("tests::Ping", Vec::<&str>::new()), "tests::Ping");
/// ```
pub fn member_signature<I>(name: &str, parameter_types: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut signature = String::from(name);
    let mut parameters = parameter_types.into_iter().peekable();
    if parameters.peek().is_some() {
        signature.push('(');
        for (i, parameter) in parameters.enumerate() {
            if i > 0 {
                signature.push(',');
            }
            signature.push_str(parameter.as_ref());
        }
        signature.push(')');
    }
    signature
}

/// Signature of a member whose parameters are given as type keys.
pub fn signature_of(name: &str, parameters: &[TypeKey]) -> String {
    member_signature(name, parameters.iter().map(TypeKey::name))
}

/// Qualified name of a test method: the declaring fixture's name and the method name.
pub fn method_path(fixture_name: &str, method_name: &str) -> String {
    format!("{fixture_name}::{method_name}")
}
