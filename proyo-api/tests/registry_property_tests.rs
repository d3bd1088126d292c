//! Property tests for webhook id allocation.

use async_trait::async_trait;
use proptest::prelude::*;
use proyo_api::{ApiResult, NewWebhook, WebhookHandler, WebhookRegistry};
use proyo_test_utils::*;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

struct Echo;

#[async_trait]
impl WebhookHandler for Echo {
    async fn handle(&self, payload: Value) -> ApiResult<Value> {
        Ok(payload)
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime builds")
}

#[tokio::test]
async fn thousand_creations_yield_unique_ids() -> ApiResult<()> {
    let registry = WebhookRegistry::new("http://localhost:3927");
    let handler: Arc<dyn WebhookHandler> = Arc::new(Echo);
    let mut seen = HashSet::new();

    for i in 0..1000 {
        let webhook = registry
            .create(
                NewWebhook {
                    path: None,
                    method: Some("POST".to_string()),
                    name: Some(format!("hook-{}", i)),
                },
                handler.clone(),
            )
            .await?;
        assert!(seen.insert(webhook.id));
    }
    assert_eq!(registry.len().await, 1000);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Deleted ids stay unresolvable and are never handed out again.
    #[test]
    fn prop_deleted_ids_are_never_reused(
        hooks in prop::collection::vec((webhook_name_strategy(), webhook_method_strategy()), 1..20),
        delete_mask in prop::collection::vec(any::<bool>(), 20),
    ) {
        let (live, retired, fresh) = runtime().block_on(async {
            let registry = WebhookRegistry::new("http://localhost:3927");
            let handler: Arc<dyn WebhookHandler> = Arc::new(Echo);
            let mut live = Vec::new();
            let mut retired = Vec::new();

            for ((name, method), delete) in hooks.iter().zip(delete_mask.iter()) {
                let request = NewWebhook { path: None, method: Some(method.clone()), name: Some(name.clone()) };
                let webhook = registry.create(request, handler.clone()).await.expect("valid method");
                if *delete {
                    registry.delete(&webhook.id).await.expect("live webhook deletes");
                    retired.push(webhook.id);
                } else {
                    live.push(webhook.id);
                }
            }

            let mut fresh = Vec::new();
            for _ in 0..hooks.len() {
                let request = NewWebhook { path: None, method: Some("GET".to_string()), name: None };
                fresh.push(registry.create(request, handler.clone()).await.expect("valid method").id);
            }

            let mut unresolved = Vec::new();
            for id in &retired {
                unresolved.push(registry.resolve(id).await.is_none());
            }
            prop_assert!(unresolved.into_iter().all(|gone| gone));
            Ok((live, retired, fresh))
        })?;

        let retired: HashSet<_> = retired.into_iter().collect();
        prop_assert!(live.iter().all(|id| !retired.contains(id)));
        prop_assert!(fresh.iter().all(|id| !retired.contains(id)));
    }
}
