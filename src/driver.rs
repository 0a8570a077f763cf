//! Host-facing driver contract and the global driver registry.
//!
//! The host looks drivers up by name, validates the user's log options with
//! the registered validator, then calls the factory once per container log
//! stream. Access to the registry is guarded by a `parking_lot::RwLock`.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;

use crate::{
    discovery::DiscoveryResolver,
    identity::Identity,
    message::LogMessage,
    options::{DRIVER_NAME, OptionError, validate_log_opts},
    publisher::{Session, SessionError, Transport, ZmqLogConfig, ZmqTransport},
};

/// Errors surfaced through the driver contract.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("log driver {0} is already registered")]
    AlreadyRegistered(String),
    #[error("log validator for {0} is already registered")]
    ValidatorAlreadyRegistered(String),
    #[error("log driver not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Options(#[from] OptionError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A log driver instance serving one container stream.
pub trait LogDriver: Send + Sync {
    /// Forward one message. Delivery is best effort.
    fn log(&self, message: &LogMessage) -> Result<(), DriverError>;
    fn close(&self) -> Result<(), DriverError>;
    fn name(&self) -> &'static str;
}

/// Host supplied description of the container being logged.
#[derive(Clone, Debug, Default)]
pub struct LoggerContext {
    pub container_id: String,
    pub container_name: String,
    /// `KEY=VALUE` environment pairs of the container.
    pub container_env: Vec<String>,
    /// Log options given by the user.
    pub config: HashMap<String, String>,
}

impl LoggerContext {
    pub fn id(&self) -> &str {
        &self.container_id
    }

    /// Identity derived from the container id and environment.
    pub fn identity(&self) -> Identity {
        Identity::from_env(self.container_id.clone(), &self.container_env)
    }
}

pub type DriverFactory =
    Arc<dyn Fn(&LoggerContext) -> Result<Box<dyn LogDriver>, DriverError> + Send + Sync>;
pub type OptionValidator =
    Arc<dyn Fn(&HashMap<String, String>) -> Result<(), OptionError> + Send + Sync>;

#[derive(Default)]
struct Registry {
    factories: HashMap<String, DriverFactory>,
    validators: HashMap<String, OptionValidator>,
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

/// Register `factory` under `name`.
pub fn register_log_driver(name: &str, factory: DriverFactory) -> Result<(), DriverError> {
    match REGISTRY.write().factories.entry(name.to_owned()) {
        Entry::Occupied(_) => Err(DriverError::AlreadyRegistered(name.to_owned())),
        Entry::Vacant(slot) => {
            slot.insert(factory);
            Ok(())
        }
    }
}

/// Register the option validator for `name`.
pub fn register_log_opt_validator(
    name: &str,
    validator: OptionValidator,
) -> Result<(), DriverError> {
    match REGISTRY.write().validators.entry(name.to_owned()) {
        Entry::Occupied(_) => Err(DriverError::ValidatorAlreadyRegistered(name.to_owned())),
        Entry::Vacant(slot) => {
            slot.insert(validator);
            Ok(())
        }
    }
}

/// Look up the factory registered under `name`.
pub fn get_log_driver(name: &str) -> Result<DriverFactory, DriverError> {
    REGISTRY
        .read()
        .factories
        .get(name)
        .cloned()
        .ok_or_else(|| DriverError::NotFound(name.to_owned()))
}

/// Validate `opts` with the validator registered under `name`.
///
/// Drivers without a validator accept any options.
pub fn validate_log_opts_for(
    name: &str,
    opts: &HashMap<String, String>,
) -> Result<(), DriverError> {
    let validator = REGISTRY.read().validators.get(name).cloned();
    match validator {
        Some(validate) => validate(opts).map_err(DriverError::from),
        None => Ok(()),
    }
}

/// Remove every registration.
#[cfg(any(test, feature = "test-util"))]
pub fn reset_registry() {
    let mut registry = REGISTRY.write();
    registry.factories.clear();
    registry.validators.clear();
}

/// Create a session for `ctx` over `transport`, discovering the server with
/// the HTTP resolver configured from `config`.
pub fn new_session(
    ctx: &LoggerContext,
    config: ZmqLogConfig,
    transport: Arc<dyn Transport>,
) -> Result<Session, SessionError> {
    let resolver = Arc::new(DiscoveryResolver::new(config.discovery.clone()));
    Session::open(ctx.identity(), &ctx.config, config, transport, resolver)
}

/// Register the `zmqlog` driver and its validator with `config`.
///
/// Every session created by the driver shares one ZeroMQ context.
pub fn register(config: ZmqLogConfig) -> Result<(), DriverError> {
    register_with_transport(config, Arc::new(ZmqTransport::new()))
}

/// Register the `zmqlog` driver publishing through `transport`.
pub fn register_with_transport(
    config: ZmqLogConfig,
    transport: Arc<dyn Transport>,
) -> Result<(), DriverError> {
    let variant = config.variant;
    register_log_driver(
        DRIVER_NAME,
        Arc::new(move |ctx: &LoggerContext| -> Result<Box<dyn LogDriver>, DriverError> {
            let session = new_session(ctx, config.clone(), Arc::clone(&transport))?;
            Ok(Box::new(session) as Box<dyn LogDriver>)
        }),
    )?;
    register_log_opt_validator(
        DRIVER_NAME,
        Arc::new(move |opts: &HashMap<String, String>| validate_log_opts(opts, variant)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Variant, ZMQ_ADDRESS};
    use crate::test_utils::FakeTransport;
    use rstest::rstest;
    use serial_test::serial;

    struct NullDriver;

    impl LogDriver for NullDriver {
        fn log(&self, _message: &LogMessage) -> Result<(), DriverError> {
            Ok(())
        }

        fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "null"
        }
    }

    fn null_factory() -> DriverFactory {
        Arc::new(|_: &LoggerContext| -> Result<Box<dyn LogDriver>, DriverError> {
            Ok(Box::new(NullDriver))
        })
    }

    #[rstest]
    #[serial]
    fn rejects_duplicate_registration() {
        reset_registry();
        register_log_driver("null", null_factory()).expect("first registration");
        let err = register_log_driver("null", null_factory()).expect_err("duplicate");
        assert!(matches!(err, DriverError::AlreadyRegistered(name) if name == "null"));
        reset_registry();
    }

    #[rstest]
    #[serial]
    fn looks_up_registered_factory() {
        reset_registry();
        register_log_driver("null", null_factory()).expect("register");
        let factory = get_log_driver("null").expect("factory registered");
        let driver = factory(&LoggerContext::default()).expect("driver created");
        assert_eq!(driver.name(), "null");
        assert!(matches!(
            get_log_driver("missing"),
            Err(DriverError::NotFound(name)) if name == "missing"
        ));
        reset_registry();
    }

    #[rstest]
    #[serial]
    fn registered_validator_follows_variant() {
        reset_registry();
        register(ZmqLogConfig::default().with_variant(Variant::TenantRouted))
            .expect("register zmqlog");
        let err = validate_log_opts_for(DRIVER_NAME, &HashMap::new()).expect_err("missing");
        assert!(err.to_string().contains(ZMQ_ADDRESS));
        let opts = HashMap::from([(ZMQ_ADDRESS.to_owned(), "tcp://x:1".to_owned())]);
        assert!(validate_log_opts_for(DRIVER_NAME, &opts).is_ok());
        assert!(matches!(
            register(ZmqLogConfig::default()),
            Err(DriverError::AlreadyRegistered(_))
        ));
        reset_registry();
    }

    #[rstest]
    #[serial]
    fn sessions_share_the_registered_transport() {
        reset_registry();
        let transport = FakeTransport::new();
        register_with_transport(ZmqLogConfig::default(), Arc::new(transport.clone()))
            .expect("register zmqlog");
        let factory = get_log_driver(DRIVER_NAME).expect("driver registered");
        let ctx = |id: &str| LoggerContext {
            container_id: id.into(),
            config: HashMap::from([(ZMQ_ADDRESS.to_owned(), "tcp://pinned:1".to_owned())]),
            ..LoggerContext::default()
        };

        let first = factory(&ctx("c1")).expect("first driver");
        let second = factory(&ctx("c2")).expect("second driver");
        first.log(&LogMessage::stdout("one")).expect("log");
        second.log(&LogMessage::stdout("two")).expect("log");

        let sockets = transport.sockets();
        assert_eq!(sockets.len(), 2, "both sessions opened through one transport");
        assert_eq!(sockets[0].sent()[0][1], b"c1: one".to_vec());
        assert_eq!(sockets[1].sent()[0][1], b"c2: two".to_vec());
        reset_registry();
    }

    #[rstest]
    fn context_identity_defaults() {
        let ctx = LoggerContext {
            container_id: "c1".into(),
            container_env: vec!["TENANT_ID=t1".into()],
            ..LoggerContext::default()
        };
        let identity = ctx.identity();
        assert_eq!(identity.container_id(), "c1");
        assert_eq!(identity.tenant_id(), "t1");
        assert_eq!(identity.service_id(), "default");
    }
}
