//! Global properties are read-only, run-wide values such as the model parameters. Each property
//! is a type declared with `define_global_property!`, optionally with a validator that runs when
//! the value is set, so an out-of-range configuration is rejected before any plan executes.
//!
//! ```
//! use barracks_epi::{define_global_property, Context, ContextGlobalPropertiesExt};
//!
//! define_global_property!(ContactRadius, f64, |radius: &f64| {
//!     if *radius > 0.0 {
//!         Ok(())
//!     } else {
//!         Err(barracks_epi::EpiError::ConfigurationError("radius must be positive".into()))
//!     }
//! });
//!
//! let mut context = Context::new();
//! context.set_global_property_value(ContactRadius, 2.0).unwrap();
//! assert_eq!(context.get_global_property_value(ContactRadius), Some(&2.0));
//! ```
use std::any::{Any, TypeId};
use std::fs;
use std::path::Path;

use log::{debug, trace};
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::EpiError;
use crate::hashing::HashMap;

/// Defines a global property with the following parameters:
/// * `$global_property`: Name for the identifier type of the global property
/// * `$value`: The type of the property's value
/// * `$validate`: A function (or closure) that checks the validity of the property (optional)
#[macro_export]
macro_rules! define_global_property {
    ($global_property:ident, $value:ty, $validate: expr) => {
        #[derive(Copy, Clone)]
        pub struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;

            fn validate(val: &$value) -> Result<(), $crate::error::EpiError> {
                $validate(val)
            }
        }
    };

    ($global_property: ident, $value: ty) => {
        $crate::define_global_property!($global_property, $value, |_| { Ok(()) });
    };
}
pub use define_global_property;

pub trait GlobalProperty: Any {
    type Value: Any;

    /// Checks a candidate value before it is stored.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::ConfigurationError` (or another variant) describing why the value is
    /// unusable.
    fn validate(value: &Self::Value) -> Result<(), EpiError>;
}

struct GlobalPropertiesDataContainer {
    global_property_container: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesDataContainer,
    GlobalPropertiesDataContainer {
        global_property_container: HashMap::default(),
    }
);

pub trait ContextGlobalPropertiesExt {
    /// Validates and stores `value`.
    ///
    /// # Errors
    ///
    /// Returns the validator's error, or `EpiError::ConfigurationError` if the property was
    /// already set.
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        property: T,
        value: T::Value,
    ) -> Result<(), EpiError>;

    /// Returns the stored value, or `None` if the property was never set.
    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;

    /// Reads a JSON file into `T`.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::IoError` if the file cannot be read and `EpiError::JsonError` if it
    /// does not describe a `T`.
    fn load_parameters_from_json<T: DeserializeOwned>(&mut self, file_path: &Path)
        -> Result<T, EpiError>;
}

impl ContextGlobalPropertiesExt for Context {
    #[allow(clippy::needless_pass_by_value)]
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        _property: T,
        value: T::Value,
    ) -> Result<(), EpiError> {
        T::validate(&value)?;
        let data_container = self.get_data_mut(GlobalPropertiesPlugin);
        let type_id = TypeId::of::<T>();
        if data_container.global_property_container.contains_key(&type_id) {
            return Err(EpiError::ConfigurationError(format!(
                "global property {} is already set",
                std::any::type_name::<T>()
            )));
        }
        trace!("setting global property {}", std::any::type_name::<T>());
        data_container
            .global_property_container
            .insert(type_id, Box::new(value));
        Ok(())
    }

    #[allow(clippy::needless_pass_by_value)]
    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        self.try_get_data(GlobalPropertiesPlugin)?
            .global_property_container
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T::Value>())
    }

    fn load_parameters_from_json<T: DeserializeOwned>(
        &mut self,
        file_path: &Path,
    ) -> Result<T, EpiError> {
        debug!("loading parameters from {}", file_path.display());
        let config_file = fs::read_to_string(file_path)?;
        let config = serde_json::from_str(&config_file)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize, PartialEq)]
    pub struct StepConfig {
        step: f64,
        days: u32,
    }

    define_global_property!(StepProperty, StepConfig, |value: &StepConfig| {
        if value.step > 0.0 {
            Ok(())
        } else {
            Err(EpiError::ConfigurationError("step must be positive".to_string()))
        }
    });

    define_global_property!(UncheckedProperty, u32);

    #[test]
    fn set_and_get() {
        let mut context = Context::new();
        assert!(context.get_global_property_value(UncheckedProperty).is_none());
        context
            .set_global_property_value(UncheckedProperty, 3)
            .unwrap();
        assert_eq!(context.get_global_property_value(UncheckedProperty), Some(&3));
    }

    #[test]
    fn validator_rejects_bad_value() {
        let mut context = Context::new();
        let result =
            context.set_global_property_value(StepProperty, StepConfig { step: 0.0, days: 1 });
        assert!(matches!(result, Err(EpiError::ConfigurationError(_))));
        assert!(context.get_global_property_value(StepProperty).is_none());
    }

    #[test]
    fn cannot_set_twice() {
        let mut context = Context::new();
        context
            .set_global_property_value(UncheckedProperty, 1)
            .unwrap();
        assert!(context
            .set_global_property_value(UncheckedProperty, 2)
            .is_err());
        assert_eq!(context.get_global_property_value(UncheckedProperty), Some(&1));
    }

    #[test]
    fn load_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"step\": 60.0, \"days\": 3}}").unwrap();
        let mut context = Context::new();
        let config: StepConfig = context.load_parameters_from_json(file.path()).unwrap();
        assert_eq!(config, StepConfig { step: 60.0, days: 3 });
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let mut context = Context::new();
        let result: Result<StepConfig, _> =
            context.load_parameters_from_json(Path::new("/nonexistent/params.json"));
        assert!(matches!(result, Err(EpiError::IoError(_))));
    }
}
