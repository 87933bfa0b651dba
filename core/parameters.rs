use std::ops::Index;

use tracing::trace;

use crate::value::{Value, ValueType};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    pub declared_type: Option<ValueType>,
    pub direction: Direction,
    pub is_nullable: bool,
    pub size: Option<usize>,
    pub source_column: Option<String>,
    pub source_column_null_mapping: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// A positional parameter, named `?N` after its 1-based position.
    pub fn positional(position: usize, value: impl Into<Value>) -> Self {
        Self::new(format!("?{position}"), value)
    }

    pub fn with_type(mut self, declared_type: ValueType) -> Self {
        self.declared_type = Some(declared_type);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn nullable(mut self, is_nullable: bool) -> Self {
        self.is_nullable = is_nullable;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_source_column(mut self, column: impl Into<String>, null_mapping: bool) -> Self {
        self.source_column = Some(column.into());
        self.source_column_null_mapping = null_mapping;
        self
    }

    /// Declared type if set, otherwise the type of the bound value.
    pub fn value_type(&self) -> ValueType {
        self.declared_type.unwrap_or_else(|| self.value.value_type())
    }

    /// Declared size, or the length of a text or blob value.
    pub fn effective_size(&self) -> Option<usize> {
        self.size.or_else(|| self.value.size())
    }

    pub fn is_positional(&self) -> bool {
        self.name.is_empty() || self.name.starts_with('?')
    }

    /// Whether `name` addresses this parameter. Case-insensitive, and the
    /// bind prefix (`@`, `:` or `$`) is optional on either side.
    pub fn is_named(&self, name: &str) -> bool {
        !self.is_positional() && bare_name(&self.name).eq_ignore_ascii_case(bare_name(name))
    }

    /// A brand-new parameter with every field copied.
    fn copy_of(&self) -> Self {
        Self {
            name: self.name.clone(),
            value: self.value.clone(),
            declared_type: self.declared_type,
            direction: self.direction,
            is_nullable: self.is_nullable,
            size: self.size,
            source_column: self.source_column.clone(),
            source_column_null_mapping: self.source_column_null_mapping,
        }
    }
}

pub(crate) fn bare_name(name: &str) -> &str {
    name.strip_prefix(['@', ':', '$']).unwrap_or(name)
}

/// Ordered, name- and index-addressable parameters of one command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    list: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value copy of `source`. The result shares no state with it.
    pub fn with_add_range(source: &Parameters) -> Result<Self> {
        let mut copy = Self::new();
        copy.add_range(source.iter().map(Parameter::copy_of))?;
        Ok(copy)
    }

    /// Point-in-time copy used for invocation records.
    pub fn snapshot(&self) -> Self {
        Self {
            list: self.list.iter().map(Parameter::copy_of).collect(),
        }
    }

    pub fn add(&mut self, parameter: Parameter) -> &mut Parameter {
        trace!(name = %parameter.name, "adding parameter");
        self.list.push(parameter);
        let last = self.list.len() - 1;
        &mut self.list[last]
    }

    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Parameter {
        self.add(Parameter::new(name, value))
    }

    /// Add a batch of parameters, all or nothing.
    ///
    /// A batch must be homogeneous, either all named or all positional, and
    /// named parameters may not repeat a name already in the batch or in the
    /// collection. Nothing is added unless the whole batch is valid.
    pub fn add_range(&mut self, batch: impl IntoIterator<Item = Parameter>) -> Result<()> {
        let batch: Vec<Parameter> = batch.into_iter().collect();
        let Some(first) = batch.first() else {
            return Ok(());
        };
        let positional = first.is_positional();
        for (i, parameter) in batch.iter().enumerate() {
            if parameter.is_positional() != positional {
                return Err(Error::InvalidParameterBatch(format!(
                    "parameter {i} (`{}`) mixes named and positional parameters",
                    parameter.name
                )));
            }
            if positional {
                continue;
            }
            let duplicate_in_batch = batch[..i].iter().any(|p| p.is_named(&parameter.name));
            if duplicate_in_batch || self.index_of(&parameter.name).is_some() {
                return Err(Error::InvalidParameterBatch(format!(
                    "duplicate parameter name `{}`",
                    parameter.name
                )));
            }
        }
        trace!(count = batch.len(), "adding parameter batch");
        self.list.extend(batch);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, parameter: Parameter) -> Result<()> {
        if index > self.list.len() {
            return Err(Error::ParameterIndexOutOfBounds {
                index,
                len: self.list.len(),
            });
        }
        self.list.insert(index, parameter);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Parameter> {
        let index = self.position(name)?;
        Ok(self.list.remove(index))
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Parameter> {
        if index >= self.list.len() {
            return Err(Error::ParameterIndexOutOfBounds {
                index,
                len: self.list.len(),
            });
        }
        Ok(self.list.remove(index))
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.list.iter()
    }

    pub fn get_at(&self, index: usize) -> Result<&Parameter> {
        self.list.get(index).ok_or(Error::ParameterIndexOutOfBounds {
            index,
            len: self.list.len(),
        })
    }

    pub fn get_at_mut(&mut self, index: usize) -> Result<&mut Parameter> {
        let len = self.list.len();
        self.list
            .get_mut(index)
            .ok_or(Error::ParameterIndexOutOfBounds { index, len })
    }

    /// The single parameter called `name`.
    pub fn get(&self, name: &str) -> Result<&Parameter> {
        let index = self.position(name)?;
        Ok(&self.list[index])
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        let index = self.position(name)?;
        Ok(&mut self.list[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.list.iter().any(|p| p.is_named(name))
    }

    /// Position of the first parameter called `name`, if any.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.list.iter().position(|p| p.is_named(name))
    }

    fn position(&self, name: &str) -> Result<usize> {
        let mut matches = self
            .list
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_named(name) || p.name == name);
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Ok(index),
            (None, _) => Err(Error::ParameterNotFound(name.to_string())),
            (Some(_), Some(_)) => Err(Error::AmbiguousParameter(name.to_string())),
        }
    }
}

impl Index<usize> for Parameters {
    type Output = Parameter;

    fn index(&self, index: usize) -> &Self::Output {
        &self.list[index]
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}
