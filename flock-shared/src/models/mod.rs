/// Database models for Flock
///
/// Each model owns its table's queries as associated functions taking a
/// `&PgPool`. List queries accept a [`ChurchScope`](crate::auth::scope::ChurchScope)
/// and always intersect their filter with it, so a caller cannot read rows
/// outside the churches its role grants.
///
/// # Models
///
/// - `region`: Fields and districts (organisational hierarchy)
/// - `church`: Local churches
/// - `user`: Staff accounts, roles and church assignments
/// - `member`: Membership records
/// - `visitor`: Visitors and follow-up
/// - `event`: National/field/district/church events
/// - `attendance`: Service attendance rows
/// - `transfer`: Inter-church transfer requests
/// - `missionary_report`: Monthly missionary activity counters
/// - `pagination`: Offset/limit paging shared by all list queries

pub mod attendance;
pub mod church;
pub mod event;
pub mod member;
pub mod missionary_report;
pub mod pagination;
pub mod region;
pub mod transfer;
pub mod user;
pub mod visitor;

/// Error returned when a stored or submitted value is not part of an enumeration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} value: {value:?}")]
pub struct UnknownVariant {
    /// Enumeration name
    pub kind: &'static str,

    /// Offending value
    pub value: String,
}

/// Declares an enumeration stored as a text column
///
/// Generates `as_str`, `ALL`, `FromStr`, `TryFrom<String>` (used by
/// `#[sqlx(try_from = "String")]` on row structs) and `Display`, keeping the
/// serde names identical to the database values.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $text:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Database and wire representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

/// Deserializes a patch field of a nullable column
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: an absent key stays `None` (leave unchanged), an
/// explicit `null` becomes `Some(None)` (clear) and a value becomes
/// `Some(Some(v))`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}

/// Escapes `%`, `_` and `\` so user text matches literally inside `ILIKE`
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
