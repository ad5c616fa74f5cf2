/// Use this to define a unique type which will be used as a key to retrieve
/// an independent rng instance when calling `Context::sample`.
///
/// Every stream is seeded from the base seed and the stream's name, so adding
/// a new stream never perturbs the draws of an existing one.
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        #[derive(Copy, Clone)]
        pub struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $crate::rand::rngs::SmallRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}
pub use define_rng;
