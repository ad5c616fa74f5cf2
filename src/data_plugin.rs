use std::any::Any;

/// A trait for objects that can provide data containers to be held by `Context`
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new type for storing data in `Context`.
///
/// ```
/// use barracks_epi::{define_data_plugin, Context};
///
/// define_data_plugin!(TickCounter, usize, 0);
///
/// let mut context = Context::new();
/// *context.get_data_mut(TickCounter) += 1;
/// assert_eq!(*context.get_data(TickCounter), 1);
/// ```
#[macro_export]
macro_rules! define_data_plugin {
    ($data_plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $data_plugin;

        impl $crate::data_plugin::DataPlugin for $data_plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;
