//! Code for heat supply models.
use crate::catalog::UnitCatalog;
use crate::input::load_model;
use crate::parameters::GlobalParameters;
use crate::time_series::AlignedTimeSeries;
use crate::topology::{self, Topology};
use anyhow::Result;
use std::path::Path;

/// Everything needed to optimise one heat supply system
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// The selected units
    pub catalog: UnitCatalog,
    /// Economic parameters and solver settings
    pub parameters: GlobalParameters,
    /// Hourly demand and prices
    pub series: AlignedTimeSeries,
}

impl Model {
    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        load_model(model_dir)
    }

    /// Build the energy system graph for this model
    pub fn build_topology(&self) -> Result<Topology> {
        topology::build(&self.catalog, &self.parameters, &self.series)
    }
}
