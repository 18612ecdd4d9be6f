//! System default configuration provider
// (c) 2024 Ross Younger

use crate::Configuration;
use figment::{
    Metadata, Profile, Provider,
    providers::Serialized,
    value::{Dict, Map},
};

/// Provides [`Configuration::system_default()`] to a [`figment::Figment`].
///
/// This is always joined underneath every other source.
pub(super) struct SystemDefault;

impl Provider for SystemDefault {
    fn metadata(&self) -> Metadata {
        Metadata::named("built-in default")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(Configuration::system_default()).data()
    }
}

#[cfg(test)]
mod test {
    use crate::{Configuration, config::Manager};
    use pretty_assertions::assert_eq;

    #[test]
    fn system_default_underlays_everything() {
        let mut mgr = Manager::without_default();
        assert!(mgr.get::<Configuration>().is_err());

        mgr.apply_system_default();
        let cfg = mgr.get::<Configuration>().unwrap();
        assert_eq!(&cfg, Configuration::system_default());
    }
}
