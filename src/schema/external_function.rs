use inventory::collect;

use super::Value;

/// A host function callable from ink through an `EXTERNAL` declaration.
///
/// Returning `None` pushes a void result.
pub type ExternalFunction = Box<dyn FnMut(&[Value]) -> Result<Option<Value>, String>>;

pub(crate) struct ExternalBinding {
    pub(crate) function: ExternalFunction,
    /// Whether the function may be run while the engine is looking ahead past a newline.
    pub(crate) lookahead_safe: bool,
}

/// An external registered at compile time with [`ink_external!`](crate::ink_external).
pub struct RegisteredExternal {
    pub name: &'static str,
    pub handler: fn(&[Value]) -> Result<Option<Value>, String>,
    pub lookahead_safe: bool,
}

collect!(RegisteredExternal);

pub(crate) fn registered() -> impl Iterator<Item = &'static RegisteredExternal> {
    inventory::iter::<RegisteredExternal>.into_iter()
}

/// Handle returned when observing a variable, used to remove the observer again.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ObserverId(pub(crate) usize);

/// Declares a function and registers it as an ink external of the same name.
///
/// Parameters are converted from ink values with `TryFrom<&Value>`; the return
/// value with `Into<Value>`.
///
/// ```ignore
/// ink_external! {
///     fn add(a: i32, b: i32) -> i32 { a + b }
/// }
/// ```
#[macro_export]
macro_rules! ink_external {
    { fn $name:ident($($param:ident : $type:ty),*$(,)?) -> $ret:ty $body:block } => {
        $crate::ink_external! { @lookahead true; fn $name($($param : $type),*) -> $ret $body }
    };
    { #[lookahead_unsafe] fn $name:ident($($param:ident : $type:ty),*$(,)?) -> $ret:ty $body:block } => {
        $crate::ink_external! { @lookahead false; fn $name($($param : $type),*) -> $ret $body }
    };
    { @lookahead $safe:expr; fn $name:ident($($param:ident : $type:ty),*) -> $ret:ty $body:block } => {
        #[allow(unused_mut, unused_variables)]
        fn $name(mut params: &[$crate::Value]) -> ::std::result::Result<::std::option::Option<$crate::Value>, ::std::string::String> {
            $(
                let $param: $type = match params.first() {
                    Some(value) => <$type as ::std::convert::TryFrom<&$crate::Value>>::try_from(value)
                        .map_err(|err| format!("Invalid argument passed to EXTERNAL function {}: {}", stringify!($name), err))?,
                    None => return Err(format!("Too few arguments passed to EXTERNAL function {}", stringify!($name))),
                };
                params = &params[1..];
            )*

            if !params.is_empty() {
                return Err(format!(
                    "Extra arguments passed to EXTERNAL function {}: {} extra",
                    stringify!($name),
                    params.len(),
                ));
            }
            let result: $ret = $body;
            Ok(Some($crate::Value::from(result)))
        }

        $crate::inventory::submit! {
            $crate::RegisteredExternal {
                name: stringify!($name),
                handler: $name,
                lookahead_safe: $safe,
            }
        }
    };
}
