//! Conversion of bind arguments into command parameters.

use crate::parameters::{Parameter, Parameters};
use crate::value::Value;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    None,
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Params {
    /// Positional values are numbered from `?{bound + 1}`.
    pub(crate) fn into_parameters_after(self, bound: usize) -> Result<Parameters> {
        let mut parameters = Parameters::new();
        match self {
            Params::None => {}
            Params::Positional(values) => parameters.add_range(
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| Parameter::positional(bound + i + 1, value)),
            )?,
            Params::Named(values) => parameters.add_range(
                values
                    .into_iter()
                    .map(|(name, value)| Parameter::new(name, value)),
            )?,
        }
        Ok(parameters)
    }
}

pub trait IntoParams {
    fn into_params(self) -> Result<Params>;
}

impl IntoParams for () {
    fn into_params(self) -> Result<Params> {
        Ok(Params::None)
    }
}

impl IntoParams for Params {
    fn into_params(self) -> Result<Params> {
        Ok(self)
    }
}

impl<T: Into<Value>> IntoParams for Vec<T> {
    fn into_params(self) -> Result<Params> {
        Ok(Params::Positional(
            self.into_iter().map(Into::into).collect(),
        ))
    }
}

impl<T: Into<Value>, const N: usize> IntoParams for [T; N] {
    fn into_params(self) -> Result<Params> {
        Ok(Params::Positional(
            self.into_iter().map(Into::into).collect(),
        ))
    }
}

impl<T: Into<Value>> IntoParams for Vec<(String, T)> {
    fn into_params(self) -> Result<Params> {
        Ok(Params::Named(
            self.into_iter()
                .map(|(name, value)| (name, value.into()))
                .collect(),
        ))
    }
}

impl<T: Into<Value>, const N: usize> IntoParams for [(&str, T); N] {
    fn into_params(self) -> Result<Params> {
        Ok(Params::Named(
            self.into_iter()
                .map(|(name, value)| (name.to_string(), value.into()))
                .collect(),
        ))
    }
}

/// Build a positional argument list from a comma separated list of values.
#[macro_export]
macro_rules! params {
    () => {
        ()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::params::Params::Positional(vec![$($crate::Value::from($value)),+])
    };
}

/// Build a named argument list, `named_params! { "@id": 1, "@name": "x" }`.
#[macro_export]
macro_rules! named_params {
    () => {
        ()
    };
    ($($name:literal : $value:expr),+ $(,)?) => {
        $crate::params::Params::Named(vec![$(($name.to_string(), $crate::Value::from($value))),+])
    };
}

/// Build params from an iterator of values.
pub fn params_from_iter<I>(iter: I) -> Params
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    Params::Positional(iter.into_iter().map(Into::into).collect())
}
