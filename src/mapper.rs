//! Object/tuple mapping boundary.
//!
//! A [`Mapper`] tells the session how to derive an object's identity, how to
//! turn it into a tuple and back, and how to build new instances.

use crate::error::{Result, SessionError};
use crate::types::{Identity, Tuple};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Capability set the session needs from the mapping layer.
pub trait Mapper: Send + Sync {
    /// Domain object type.
    type Object;

    /// Constructor arguments accepted by [`Mapper::new_object`].
    type Args;

    /// Derive the identity of an object. Must be deterministic.
    fn identity(&self, object: &Self::Object) -> Result<Identity>;

    /// Map an object to its tuple.
    fn dump(&self, object: &Self::Object) -> Result<Tuple>;

    /// Map a stored tuple to an object.
    fn load(&self, tuple: &Tuple) -> Result<Self::Object>;

    /// Construct a new object from constructor arguments.
    fn new_object(&self, args: Self::Args) -> Result<Self::Object>;

    /// Whether the object's attributes differ from `snapshot`.
    fn dirty(&self, object: &Self::Object, snapshot: &Tuple) -> Result<bool> {
        Ok(self.dump(object)? != *snapshot)
    }
}

/// Mapper for any serde model whose fields are scalar attributes.
///
/// Objects are converted through `serde_json`; `keys` names the attributes
/// that make up the identity, in order.
pub struct SerdeMapper<T> {
    keys: Vec<String>,
    _model: PhantomData<fn() -> T>,
}

impl<T> SerdeMapper<T> {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            _model: PhantomData,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl<T> Mapper for SerdeMapper<T>
where
    T: Serialize + DeserializeOwned,
{
    type Object = T;
    type Args = Tuple;

    fn identity(&self, object: &T) -> Result<Identity> {
        let tuple = self.dump(object)?;
        Identity::from_tuple(&tuple, self.keys.as_slice()).map_err(|attribute| {
            SessionError::Mapping(format!("object has no key attribute {}", attribute))
        })
    }

    fn dump(&self, object: &T) -> Result<Tuple> {
        Tuple::from_json(serde_json::to_value(object)?)
    }

    fn load(&self, tuple: &Tuple) -> Result<T> {
        Ok(serde_json::from_value(tuple.to_json()?)?)
    }

    fn new_object(&self, args: Tuple) -> Result<T> {
        self.load(&args)
    }
}
