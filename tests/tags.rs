// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::runtime::Runtime;

    use vtopo_lib::{
        error::Error,
        tags::{tag_failure_domains, REGION_CATEGORY, ZONE_CATEGORY},
        test_env,
    };

    #[test]
    fn tags_every_failure_domain() {
        let inventory = Arc::new(test_env::three_zone_inventory());
        let sessions = test_env::session_cache(&inventory);
        let config = test_env::three_zone_config();

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            tag_failure_domains(&sessions, &config.vcenters[0], &config.failure_domains)
                .await
                .unwrap();
            // A second pass finds everything in place.
            tag_failure_domains(&sessions, &config.vcenters[0], &config.failure_domains)
                .await
                .unwrap();
        });

        assert_eq!(
            inventory.categories("vc1"),
            vec![REGION_CATEGORY.to_string(), ZONE_CATEGORY.to_string()]
        );
        assert_eq!(inventory.tags("vc1").len(), 6);

        let attachments = inventory.attachments("vc1");
        assert_eq!(attachments.len(), 6);
        assert!(attachments.contains(&(
            REGION_CATEGORY.to_string(),
            "region2".to_string(),
            "/dc2".to_string()
        )));
        assert!(attachments.contains(&(
            ZONE_CATEGORY.to_string(),
            "zone3".to_string(),
            "/dc3/host/c3".to_string()
        )));
        assert_eq!(inventory.login_count("vc1"), 1);
    }

    #[test]
    fn tagging_requires_credentials() {
        let inventory = Arc::new(test_env::three_zone_inventory());
        let sessions = vtopo_lib::session::SessionCache::new(inventory);
        let config = test_env::three_zone_config();

        let rt = Runtime::new().unwrap();
        let err = rt
            .block_on(tag_failure_domains(
                &sessions,
                &config.vcenters[0],
                &config.failure_domains,
            ))
            .unwrap_err();
        assert!(matches!(err, Error::CredentialNotFound { ref server } if server == "vc1"));
    }
}
