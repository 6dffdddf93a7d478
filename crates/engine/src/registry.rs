//! Operator registry: explicit table from type id to factory

use std::collections::BTreeMap;
use std::fmt;

use rasterflow_core::{Error, ParamSchema, Parameters, Result};

use crate::operator::Operator;

/// Builds an operator from validated parameters
pub type OperatorFactory = Box<dyn Fn(&Parameters) -> Result<Box<dyn Operator>> + Send + Sync>;

/// Registration entry of one operator type
pub struct OperatorSpi {
    type_id: String,
    description: String,
    schema: ParamSchema,
    factory: OperatorFactory,
}

impl OperatorSpi {
    pub fn new<F>(
        type_id: impl Into<String>,
        description: impl Into<String>,
        schema: ParamSchema,
        factory: F,
    ) -> Self
    where
        F: Fn(&Parameters) -> Result<Box<dyn Operator>> + Send + Sync + 'static,
    {
        Self {
            type_id: type_id.into(),
            description: description.into(),
            schema,
            factory: Box::new(factory),
        }
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }
}

impl fmt::Debug for OperatorSpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorSpi")
            .field("type_id", &self.type_id)
            .field("params", &self.schema.defs().len())
            .finish()
    }
}

/// Maps operator type ids to their registration entries.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    spis: BTreeMap<String, OperatorSpi>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator type, returning the entry it replaces
    pub fn register(&mut self, spi: OperatorSpi) -> Option<OperatorSpi> {
        self.spis.insert(spi.type_id.clone(), spi)
    }

    pub fn get(&self, type_id: &str) -> Option<&OperatorSpi> {
        self.spis.get(type_id)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.spis.contains_key(type_id)
    }

    /// Registered entries ordered by type id
    pub fn descriptors(&self) -> impl Iterator<Item = &OperatorSpi> {
        self.spis.values()
    }

    pub fn len(&self) -> usize {
        self.spis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spis.is_empty()
    }

    /// Validate `params` against the schema and run the factory.
    pub fn create(&self, type_id: &str, params: &Parameters) -> Result<Box<dyn Operator>> {
        let spi = self
            .spis
            .get(type_id)
            .ok_or_else(|| Error::UnknownOperator(type_id.to_string()))?;
        let params = spi.schema.validate(params)?;
        (spi.factory)(&params)
    }
}
