//! Channel table: the fixed set of relay channels built at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use stul_core::Role;

use crate::websocket::registry::ConnectionRegistry;

/// A named relay scope with one host secret and a registry per role.
pub struct Channel {
    name: String,
    secret: SecretString,
    clients: ConnectionRegistry,
    hosts: ConnectionRegistry,
}

impl Channel {
    /// Create a channel with empty registries.
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: SecretString::from(secret.into()),
            clients: ConnectionRegistry::new(Role::Client),
            hosts: ConnectionRegistry::new(Role::Host),
        }
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check a host password against the channel secret.
    ///
    /// Plain equality. The channel secret is a shared password, not a
    /// cryptographic credential, so timing is not hidden.
    pub fn authenticate(&self, password: &str) -> bool {
        self.secret.expose_secret() == password
    }

    /// Registry holding connections of `role`.
    pub fn registry(&self, role: Role) -> &ConnectionRegistry {
        match role {
            Role::Client => &self.clients,
            Role::Host => &self.hosts,
        }
    }

    /// Client registry.
    pub fn clients(&self) -> &ConnectionRegistry {
        &self.clients
    }

    /// Host registry.
    pub fn hosts(&self) -> &ConnectionRegistry {
        &self.hosts
    }

    /// Whether at least one host is registered right now.
    pub fn host_connected(&self) -> bool {
        !self.hosts.is_empty()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("clients", &self.clients.len())
            .field("hosts", &self.hosts.len())
            .finish_non_exhaustive()
    }
}

/// Channel name to [`Channel`] map. Membership is fixed once built.
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: HashMap<String, Arc<Channel>>,
}

impl ChannelTable {
    /// Build the table from `(name, secret)` pairs. Later duplicates win.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let channels = entries
            .into_iter()
            .map(|(name, secret)| {
                let name = name.into();
                let channel = Arc::new(Channel::new(name.clone(), secret));
                (name, channel)
            })
            .collect();
        Self { channels }
    }

    /// Look up a channel by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).cloned()
    }

    /// `false` for unknown channels as well as wrong passwords.
    pub fn authenticate(&self, name: &str, password: &str) -> bool {
        self.channels
            .get(name)
            .is_some_and(|channel| channel.authenticate(password))
    }

    /// Number of configured channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is configured.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All channels, sorted by name.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        let mut channels: Vec<Arc<Channel>> = self.channels.values().cloned().collect();
        channels.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ChannelTable {
        ChannelTable::new([("alpha", "s3cret"), ("beta", "hunter2")])
    }

    #[test]
    fn lookup_known_and_unknown() {
        let t = table();
        assert_eq!(t.lookup("alpha").unwrap().name(), "alpha");
        assert!(t.lookup("gamma").is_none());
        assert!(t.lookup("").is_none());
    }

    #[test]
    fn lookup_returns_shared_channel() {
        let t = table();
        let a = t.lookup("alpha").unwrap();
        let b = t.lookup("alpha").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn authenticate_matches_secret_only() {
        let t = table();
        assert!(t.authenticate("alpha", "s3cret"));
        assert!(!t.authenticate("alpha", "hunter2"));
        assert!(!t.authenticate("alpha", ""));
        assert!(!t.authenticate("gamma", "s3cret"));
    }

    #[test]
    fn authenticate_is_case_sensitive() {
        let channel = Channel::new("alpha", "S3cret");
        assert!(!channel.authenticate("s3cret"));
        assert!(channel.authenticate("S3cret"));
    }

    #[test]
    fn new_channel_has_empty_registries() {
        let channel = Channel::new("alpha", "x");
        assert!(channel.clients().is_empty());
        assert!(channel.hosts().is_empty());
        assert!(!channel.host_connected());
        assert_eq!(channel.registry(Role::Host).role(), Role::Host);
        assert_eq!(channel.registry(Role::Client).role(), Role::Client);
    }

    #[test]
    fn names_sorted() {
        let t = ChannelTable::new([("zeta", "1"), ("alpha", "2"), ("mid", "3")]);
        assert_eq!(t.names(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(t.len(), 3);
        assert!(!t.is_empty());
    }

    #[test]
    fn empty_table() {
        let t = ChannelTable::new(Vec::<(String, String)>::new());
        assert!(t.is_empty());
        assert!(t.names().is_empty());
    }

    #[test]
    fn debug_hides_secret() {
        let channel = Channel::new("alpha", "s3cret");
        let debug = format!("{channel:?}");
        assert!(debug.contains("alpha"));
        assert!(!debug.contains("s3cret"));
    }
}
