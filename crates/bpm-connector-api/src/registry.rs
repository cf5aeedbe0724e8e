// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Static registration of connector implementations.
//!
//! Implementations register themselves under the class name their `.impl`
//! descriptor declares. Registrations are collected at link time with the
//! `inventory` crate, so linking a connector crate into the engine binary is
//! enough to make it loadable.

use crate::connector::Connector;

/// Creates a fresh connector instance.
pub type ConnectorFactory = fn() -> Box<dyn Connector>;

/// A connector implementation available to the engine.
pub struct ConnectorRegistration {
    /// Class name as written in `implementationClassname`.
    pub class_name: &'static str,
    /// Factory producing a new instance per execution.
    pub factory: ConnectorFactory,
}

// Register ConnectorRegistration with inventory
inventory::collect!(&'static ConnectorRegistration);

/// Find a registered connector by class name.
pub fn find_registration(class_name: &str) -> Option<&'static ConnectorRegistration> {
    inventory::iter::<&'static ConnectorRegistration>
        .into_iter()
        .copied()
        .find(|registration| registration.class_name == class_name)
}

/// All registered connectors, in link order.
pub fn registered_connectors() -> impl Iterator<Item = &'static ConnectorRegistration> {
    inventory::iter::<&'static ConnectorRegistration>
        .into_iter()
        .copied()
}

#[doc(hidden)]
pub fn default_factory<T: Connector + Default + 'static>() -> Box<dyn Connector> {
    Box::new(T::default())
}

/// Register a `Default`-constructible connector under a class name.
///
/// ```ignore
/// register_connector!("org.acme.rest.RestConnector", RestConnector);
/// ```
#[macro_export]
macro_rules! register_connector {
    ($class_name:expr, $connector:ty) => {
        const _: () = {
            static REGISTRATION: $crate::ConnectorRegistration = $crate::ConnectorRegistration {
                class_name: $class_name,
                factory: $crate::registry::default_factory::<$connector>,
            };
            $crate::inventory::submit! {
                &REGISTRATION
            }
        };
    };
}
