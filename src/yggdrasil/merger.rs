//! One identity space over a custom provider and the global provider.
//!
//! Names carrying [`MOJANG_SUFFIX`] and UUIDs carrying the provenance bit
//! belong to the global provider; everything else goes to the custom one.
//! Without a global provider every lookup is sent to the custom provider
//! unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::yggdrasil::client::{ProfileLookup, YggdrasilError};
use crate::yggdrasil::namespace::{self, MOJANG_SUFFIX};
use crate::yggdrasil::profile::{GameProfile, ProfileRef};

pub struct NamespaceMerger {
    custom: Arc<dyn ProfileLookup>,
    global: Option<Arc<dyn ProfileLookup>>,
}

impl NamespaceMerger {
    pub fn new(custom: Arc<dyn ProfileLookup>, global: Option<Arc<dyn ProfileLookup>>) -> Self {
        Self { custom, global }
    }
}

#[async_trait]
impl ProfileLookup for NamespaceMerger {
    async fn query_uuids(&self, names: &[String]) -> Result<Vec<ProfileRef>, YggdrasilError> {
        let Some(global) = &self.global else {
            return self.custom.query_uuids(names).await;
        };

        let mut custom_names = Vec::new();
        let mut global_names = Vec::new();
        for name in names {
            match namespace::strip_suffix(name) {
                Some(bare) => global_names.push(bare.to_string()),
                None => custom_names.push(name.clone()),
            }
        }

        let custom_query = async {
            if custom_names.is_empty() {
                Ok(Vec::new())
            } else {
                self.custom.query_uuids(&custom_names).await
            }
        };
        let global_query = async {
            if global_names.is_empty() {
                Ok(Vec::new())
            } else {
                global.query_uuids(&global_names).await
            }
        };
        let (mut merged, global_found) = tokio::try_join!(custom_query, global_query)?;

        merged.extend(global_found.into_iter().map(|found| ProfileRef {
            id: namespace::mask(found.id),
            name: namespace::with_suffix(&found.name),
        }));
        tracing::debug!(
            requested = names.len(),
            resolved = merged.len(),
            suffix = MOJANG_SUFFIX,
            "Merged uuid lookup"
        );
        Ok(merged)
    }

    async fn query_profile(
        &self,
        id: Uuid,
        with_signature: bool,
    ) -> Result<Option<GameProfile>, YggdrasilError> {
        match &self.global {
            Some(global) if namespace::is_masked(id) => {
                let profile = global.query_profile(namespace::unmask(id), with_signature).await?;
                Ok(profile.map(|mut profile| {
                    profile.id = id;
                    profile.name = namespace::with_suffix(&profile.name);
                    profile
                }))
            }
            _ => self.custom.query_profile(id, with_signature).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use super::*;
    use crate::yggdrasil::profile::PropertyValue;

    /// In-memory provider that records what it was asked.
    #[derive(Default)]
    pub(crate) struct FakeLookup {
        pub names: HashMap<String, Uuid>,
        pub profiles: HashMap<Uuid, GameProfile>,
        pub name_calls: Mutex<Vec<Vec<String>>>,
        pub profile_calls: Mutex<Vec<(Uuid, bool)>>,
    }

    impl FakeLookup {
        pub(crate) fn with_player(mut self, name: &str, id: Uuid) -> Self {
            self.names.insert(name.to_string(), id);
            let mut properties = BTreeMap::new();
            properties.insert(
                "textures".to_string(),
                PropertyValue {
                    value: "e30=".to_string(),
                    signature: None,
                },
            );
            self.profiles.insert(
                id,
                GameProfile {
                    id,
                    name: name.to_string(),
                    properties,
                },
            );
            self
        }
    }

    #[async_trait]
    impl ProfileLookup for FakeLookup {
        async fn query_uuids(&self, names: &[String]) -> Result<Vec<ProfileRef>, YggdrasilError> {
            self.name_calls.lock().unwrap().push(names.to_vec());
            Ok(names
                .iter()
                .filter_map(|n| self.names.get(n).map(|id| ProfileRef { id: *id, name: n.clone() }))
                .collect())
        }

        async fn query_profile(
            &self,
            id: Uuid,
            with_signature: bool,
        ) -> Result<Option<GameProfile>, YggdrasilError> {
            self.profile_calls.lock().unwrap().push((id, with_signature));
            Ok(self.profiles.get(&id).cloned())
        }
    }

    struct Broken;

    #[async_trait]
    impl ProfileLookup for Broken {
        async fn query_uuids(&self, _: &[String]) -> Result<Vec<ProfileRef>, YggdrasilError> {
            Err(YggdrasilError::Protocol("bad json".into()))
        }

        async fn query_profile(&self, _: Uuid, _: bool) -> Result<Option<GameProfile>, YggdrasilError> {
            Err(YggdrasilError::Protocol("bad json".into()))
        }
    }

    fn alice() -> Uuid {
        Uuid::parse_str("11111111222233334444555555555555").unwrap()
    }

    fn bob() -> Uuid {
        Uuid::parse_str("069a79f444e94726a5befca90e38aaf5").unwrap()
    }

    fn merger() -> (Arc<FakeLookup>, Arc<FakeLookup>, NamespaceMerger) {
        let custom = Arc::new(FakeLookup::default().with_player("Alice", alice()));
        let global = Arc::new(FakeLookup::default().with_player("Bob", bob()));
        let merger = NamespaceMerger::new(custom.clone(), Some(global.clone()));
        (custom, global, merger)
    }

    #[tokio::test]
    async fn names_are_routed_by_suffix() {
        let (custom, global, merger) = merger();
        let names = vec!["Alice".to_string(), "Bob@mojang".to_string()];
        let result = merger.query_uuids(&names).await.unwrap();

        assert_eq!(
            result,
            vec![
                ProfileRef { id: alice(), name: "Alice".into() },
                ProfileRef { id: namespace::mask(bob()), name: "Bob@mojang".into() },
            ]
        );
        assert_eq!(*custom.name_calls.lock().unwrap(), vec![vec!["Alice".to_string()]]);
        assert_eq!(*global.name_calls.lock().unwrap(), vec![vec!["Bob".to_string()]]);
    }

    #[tokio::test]
    async fn empty_partitions_are_not_queried() {
        let (custom, global, merger) = merger();
        let result = merger.query_uuids(&["Alice".to_string()]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(custom.name_calls.lock().unwrap().len(), 1);
        assert!(global.name_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_names_are_absent() {
        let (_, _, merger) = merger();
        let names = vec!["Nobody".to_string(), "Ghost@mojang".to_string()];
        assert!(merger.query_uuids(&names).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn masked_profile_lookup_is_symmetric() {
        let (custom, global, merger) = merger();
        let masked = namespace::mask(bob());
        let profile = merger.query_profile(masked, true).await.unwrap().unwrap();

        assert_eq!(profile.id, masked);
        assert_eq!(profile.name, "Bob@mojang");
        assert_eq!(*global.profile_calls.lock().unwrap(), vec![(bob(), true)]);
        assert!(custom.profile_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_profile_lookup_goes_to_custom() {
        let (custom, _, merger) = merger();
        let profile = merger.query_profile(alice(), false).await.unwrap().unwrap();
        assert_eq!(profile.id, alice());
        assert_eq!(profile.name, "Alice");
        assert_eq!(*custom.profile_calls.lock().unwrap(), vec![(alice(), false)]);
    }

    #[tokio::test]
    async fn not_found_is_not_an_error() {
        let (_, _, merger) = merger();
        let missing = Uuid::parse_str("00000000000000000000000000000001").unwrap();
        assert!(merger.query_profile(missing, false).await.unwrap().is_none());
        assert!(merger.query_profile(namespace::mask(missing), false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn without_global_everything_goes_to_custom() {
        let custom = Arc::new(FakeLookup::default().with_player("Bob@mojang", bob()));
        let merger = NamespaceMerger::new(custom.clone(), None);
        let result = merger.query_uuids(&["Bob@mojang".to_string()]).await.unwrap();
        assert_eq!(result, vec![ProfileRef { id: bob(), name: "Bob@mojang".into() }]);

        let masked = namespace::mask(alice());
        assert!(merger.query_profile(masked, false).await.unwrap().is_none());
        assert_eq!(*custom.profile_calls.lock().unwrap(), vec![(masked, false)]);
    }

    #[tokio::test]
    async fn provider_failure_fails_the_whole_batch() {
        let custom = Arc::new(FakeLookup::default().with_player("Alice", alice()));
        let merger = NamespaceMerger::new(custom, Some(Arc::new(Broken)));
        let names = vec!["Alice".to_string(), "Bob@mojang".to_string()];
        let err = merger.query_uuids(&names).await.unwrap_err();
        assert!(matches!(err, YggdrasilError::Protocol(_)));
    }
}
