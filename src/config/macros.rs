/// Define a configuration section with its defaults inline
///
/// Each field is written as `name: Type = default`. The macro emits the
/// struct with public fields, a `Default` impl built from the inline values
/// and serde derives with `#[serde(default)]`, so a TOML file only needs to
/// mention the values it overrides.
///
/// ```
/// marketfeed::config_struct! {
///     pub struct PacingConfig {
///         pacing_ms: u64 = 1200,
///         enabled: bool = true,
///     }
/// }
///
/// let pacing = PacingConfig::default();
/// assert_eq!(pacing.pacing_ms, 1200);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
