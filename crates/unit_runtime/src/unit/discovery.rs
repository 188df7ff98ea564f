//! Discovery of components already bound to the unit's backing object
//!
//! The host supplies the objects living on the backing object at creation
//! time. Discovery runs once, during the unit's first `initialize`, and
//! registers every candidate that satisfies the component contract as
//! host-managed. The unit only keeps weak handles to them: the host decides
//! how long they live.

use super::component::{Component, ComponentRef};
use super::diagnostics::AttachOrigin;
use super::error::UnitResult;
use super::{AttachOutcome, Unit};
use std::any::type_name;
use std::cell::RefCell;
use std::rc::Rc;

/// An object bound to the host-side backing object
#[derive(Debug, Clone)]
pub enum BoundObject {
    /// Satisfies the component contract
    Component(ComponentRef),
    /// Anything else the host keeps on the object (transforms, colliders, ...)
    Foreign {
        /// Type name reported by the host
        type_name: &'static str,
    },
}

impl BoundObject {
    /// Bind a component the host keeps alive through `component`
    pub fn component<C: Component>(component: &Rc<RefCell<C>>) -> Self {
        Self::Component(ComponentRef::from_rc(Rc::clone(component)))
    }

    /// Bind an object of type `T` that is not a component
    pub fn foreign<T: ?Sized>() -> Self {
        Self::Foreign {
            type_name: type_name::<T>(),
        }
    }
}

/// Host-side object a unit is created over
pub trait BackingObject {
    /// Objects currently bound to the backing object, in host order
    fn bound_objects(&self) -> Vec<BoundObject>;
}

impl BackingObject for Vec<BoundObject> {
    fn bound_objects(&self) -> Vec<BoundObject> {
        self.clone()
    }
}

/// Summary of one discovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Components registered as host-managed
    pub registered: usize,
    /// Candidates refused by the uniqueness or capability rules
    pub rejected: usize,
    /// Bound objects that are not components
    pub skipped: usize,
}

impl Unit {
    /// Register the components bound to the backing object, if there is one
    ///
    /// The backing object is read once and released afterwards.
    pub(crate) fn discover(&self) -> UnitResult<DiscoveryReport> {
        let backing = self.inner.backing.borrow_mut().take();
        let Some(backing) = backing else {
            return Ok(DiscoveryReport::default());
        };

        let mut report = DiscoveryReport::default();
        for object in backing.bound_objects() {
            let component = match object {
                BoundObject::Component(component) => component,
                BoundObject::Foreign { type_name } => {
                    log::trace!("unit `{}`: {} is not a component", self.name(), type_name);
                    report.skipped += 1;
                    continue;
                }
            };

            match self.attach_now(component, AttachOrigin::Discovery)? {
                AttachOutcome::Attached(_) => report.registered += 1,
                AttachOutcome::Rejected(_) | AttachOutcome::Deferred => report.rejected += 1,
            }
        }

        log::debug!(
            "unit `{}`: discovery registered {}, rejected {}, skipped {}",
            self.name(),
            report.registered,
            report.rejected,
            report.skipped
        );
        Ok(report)
    }
}
