// src/macros.rs
#[macro_export]
macro_rules! s {
    // String shorthand!

    // Zero-arg → String::new()
    () => {
        ::std::string::String::new()
    };
    // Any single expression: literals, consts or vars
    ($expr:expr) => {
        ::std::string::String::from($expr)
    };
}

#[macro_export]
macro_rules! join {
    // String-type concatenation shorthand!
    ($first:expr $(, $rest:expr)+ $(,)?) => {{
        let mut s = ::std::string::String::from($first);
        $(
            s.push_str($rest);
        )+
        s
    }};
}

/// Declare one schema section: the typed struct, its `FIELDS` locator table,
/// and a `fill` method that resolves every field in declaration order.
///
/// ```text
/// schema_section! {
///     pub struct Employment {
///         employer as "employer" => [id("txtEmployer")],
///     }
/// }
/// ```
///
/// Every field is `Option<FieldValue>` and serializes as `null` when absent,
/// so the JSON shape never depends on which page variant was loaded.
/// `fill` stops at the first `ResolveError`; fields resolved before it stay set.
#[macro_export]
macro_rules! schema_section {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $field:ident as $key:literal => [ $($loc:expr),+ $(,)? ] ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        $vis struct $name {
            $(
                #[serde(rename = $key)]
                pub $field: ::std::option::Option<$crate::engine::FieldValue>,
            )+
        }

        impl $name {
            pub const FIELDS: &'static [$crate::engine::FieldSpec] = &[
                $( $crate::engine::FieldSpec { key: $key, locators: &[$($loc),+] }, )+
            ];

            pub fn fill(
                &mut self,
                resolver: &$crate::engine::FieldResolver<'_>,
            ) -> ::std::result::Result<(), $crate::engine::ResolveError> {
                $( self.$field = resolver.resolve(&[$($loc),+])?; )+
                Ok(())
            }

            /// Number of fields that resolved to a value.
            pub fn populated(&self) -> usize {
                0 $( + usize::from(self.$field.is_some()) )+
            }
        }
    };
}
