//! Macros for ergonomic state machine construction.

/// Generate a state enum together with its `State`, `Display` and `FromStr`
/// implementations.
///
/// `FromStr` accepts exactly the variant names, which is how state names
/// arriving from outside the process are turned back into states.
///
/// # Example
///
/// ```
/// use relay_fsm::core::State;
/// use relay_fsm::state_enum;
///
/// state_enum! {
///     pub enum WorkflowState {
///         Start,
///         Processing,
///         Done,
///         Failed,
///     }
///     final: [Done, Failed]
///     error: [Failed]
/// }
///
/// assert_eq!(WorkflowState::variants().len(), 4);
/// assert_eq!("Done".parse::<WorkflowState>(), Ok(WorkflowState::Done));
/// assert!("Paused".parse::<WorkflowState>().is_err());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            Debug,
            serde::Serialize,
            serde::Deserialize
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn variants() -> ::std::vec::Vec<Self> {
                ::std::vec![$(Self::$variant),*]
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    _ => false,
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    _ => false,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::core::State::name(self))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::core::ParseStateError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(Self::$variant),)*
                    _ => Err($crate::core::ParseStateError::new(stringify!($name), s)),
                }
            }
        }
    };
}
