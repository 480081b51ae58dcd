//! Programmatic address-space construction.
//!
//! The builder is the seam an external model loader targets: it produces
//! the in-memory tree, enforcing construction invariants as it goes.
//! Parents are addressed by path so a loader can follow its own document
//! order without tracking ids.

use crate::node::{MethodFlavor, Template};
use crate::space::AddressSpace;
use crate::ModelError;
use mast_flow::Graph;
use mast_types::Unit;

/// Initial state of a numeric variable.
///
/// # Example
///
/// ```
/// use mast_model::NumericInit;
///
/// let init = NumericInit::new(5.0).unit("celsius").bounds(0.0, 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumericInit {
    /// Initial value.
    pub value: f64,
    /// Optional unit tag.
    pub unit: Option<Unit>,
    /// Optional inclusive lower bound.
    pub low: Option<f64>,
    /// Optional inclusive upper bound.
    pub high: Option<f64>,
}

impl NumericInit {
    /// Starts from an initial value, unbounded and unitless.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Tags the variable with a unit.
    #[must_use]
    pub fn unit(mut self, unit: impl Into<Unit>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Declares inclusive bounds.
    #[must_use]
    pub fn bounds(mut self, low: f64, high: f64) -> Self {
        self.low = Some(low);
        self.high = Some(high);
        self
    }
}

impl From<f64> for NumericInit {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

/// Fluent builder producing a populated [`AddressSpace`].
///
/// # Example
///
/// ```
/// use mast_model::{AddressSpaceBuilder, NumericInit};
///
/// let space = AddressSpaceBuilder::new("press-7")
///     .folder("root", "spindle").expect("fresh")
///     .numeric("root/spindle", "speed", NumericInit::new(0.0).bounds(0.0, 24_000.0))
///     .expect("fresh")
///     .boolean("root/spindle", "running", false).expect("fresh")
///     .build();
///
/// assert!(space.resolve_path("root/spindle/speed").is_ok());
/// ```
#[derive(Debug)]
pub struct AddressSpaceBuilder {
    space: AddressSpace,
}

impl AddressSpaceBuilder {
    /// Starts a builder around an empty space.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            space: AddressSpace::new(name),
        }
    }

    /// Sets the space description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.space.set_description(description);
        self
    }

    /// Adds a folder under the parent path.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` for a missing parent, `MALFORMED_MODEL` on invariant
    /// violations.
    pub fn folder(mut self, parent: &str, name: &str) -> Result<Self, ModelError> {
        let parent = self.space.resolve_path(parent)?;
        self.space.add_folder(parent, name)?;
        Ok(self)
    }

    /// Adds a boolean variable under the parent path.
    ///
    /// # Errors
    ///
    /// Same classes as [`folder`](Self::folder).
    pub fn boolean(mut self, parent: &str, name: &str, initial: bool) -> Result<Self, ModelError> {
        let parent = self.space.resolve_path(parent)?;
        self.space.add_boolean(parent, name, initial)?;
        Ok(self)
    }

    /// Adds a string variable under the parent path.
    ///
    /// # Errors
    ///
    /// Same classes as [`folder`](Self::folder).
    pub fn string(
        mut self,
        parent: &str,
        name: &str,
        initial: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let parent = self.space.resolve_path(parent)?;
        self.space.add_string(parent, name, initial)?;
        Ok(self)
    }

    /// Adds a numeric variable under the parent path.
    ///
    /// # Errors
    ///
    /// Same classes as [`folder`](Self::folder), plus `MALFORMED_MODEL`
    /// for inverted bounds.
    pub fn numeric(
        mut self,
        parent: &str,
        name: &str,
        init: impl Into<NumericInit>,
    ) -> Result<Self, ModelError> {
        let init = init.into();
        let parent = self.space.resolve_path(parent)?;
        self.space
            .add_numeric_full(parent, name, init.value, init.unit, init.low, init.high)?;
        Ok(self)
    }

    /// Adds an object variable under the parent path. Its properties are
    /// added with the scalar methods, using the object's path as parent.
    ///
    /// # Errors
    ///
    /// Same classes as [`folder`](Self::folder).
    pub fn object(mut self, parent: &str, name: &str) -> Result<Self, ModelError> {
        let parent = self.space.resolve_path(parent)?;
        self.space.add_object(parent, name)?;
        Ok(self)
    }

    /// Adds a sync or async method under the parent path.
    ///
    /// # Errors
    ///
    /// Same classes as [`folder`](Self::folder).
    pub fn method(
        mut self,
        parent: &str,
        name: &str,
        flavor: MethodFlavor,
        parameters: Vec<Template>,
        returns: Vec<Template>,
    ) -> Result<Self, ModelError> {
        let parent = self.space.resolve_path(parent)?;
        self.space
            .add_method(parent, name, flavor, parameters, returns)?;
        Ok(self)
    }

    /// Adds a composite method under the parent path.
    ///
    /// # Errors
    ///
    /// Same classes as [`folder`](Self::folder), plus `MALFORMED_MODEL`
    /// for graphs with out-of-range branch targets.
    pub fn composite(
        mut self,
        parent: &str,
        name: &str,
        parameters: Vec<Template>,
        returns: Vec<Template>,
        graph: Graph,
    ) -> Result<Self, ModelError> {
        let parent = self.space.resolve_path(parent)?;
        self.space
            .add_composite(parent, name, parameters, returns, graph)?;
        Ok(self)
    }

    /// Sets the description of an existing node.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` when the path does not resolve.
    pub fn describe(mut self, path: &str, description: impl Into<String>) -> Result<Self, ModelError> {
        let id = self.space.resolve_path(path)?;
        self.space.describe(id, description)?;
        Ok(self)
    }

    /// Finishes construction.
    #[must_use]
    pub fn build(self) -> AddressSpace {
        self.space
    }
}
