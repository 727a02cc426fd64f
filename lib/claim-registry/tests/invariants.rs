//! Invariants that must hold after any sequence of operations.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use claim_registry::{
    CancellationToken, ClaimRequest, ClaimService, InMemoryItemStore, ItemId, ItemPatch,
    NewItem, RegistryError,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Create(String),
    Claim(usize, String, bool),
    Release(usize),
    Rename(usize, String),
    Delete(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[a-z]{1,12}".prop_map(Op::Create),
        (0usize..6, "[A-Z][a-z]{0,8}", any::<bool>()).prop_map(|(i, g, v)| Op::Claim(i, g, v)),
        (0usize..6).prop_map(Op::Release),
        (0usize..6, "[a-z]{1,12}").prop_map(|(i, n)| Op::Rename(i, n)),
        (0usize..6).prop_map(Op::Delete),
    ]
}

/// Maps an arbitrary index onto a live id, or an id that never existed.
fn pick(ids: &[ItemId], i: usize) -> ItemId {
    ids.get(i % ids.len().max(1)).copied().unwrap_or(ItemId(999))
}

async fn run(ops: Vec<Op>) {
    let svc = ClaimService::new(InMemoryItemStore::new());
    let cancel = CancellationToken::new();
    let mut ids: Vec<ItemId> = Vec::new();
    let mut versions: HashMap<ItemId, u64> = HashMap::new();

    for op in ops {
        let mutated = match op {
            Op::Create(name) => {
                let view = svc.create(NewItem::new(name), &cancel).await.unwrap();
                ids.push(view.id);
                versions.insert(view.id, view.version);
                None
            }
            Op::Claim(i, guest, with_version) => {
                let id = pick(&ids, i);
                let mut request = ClaimRequest::new(guest);
                if with_version {
                    request = request.at_version(versions.get(&id).copied().unwrap_or(0));
                }
                Some((id, svc.claim(id, request, &cancel).await))
            }
            Op::Release(i) => {
                let id = pick(&ids, i);
                Some((id, svc.release(id, &cancel).await))
            }
            Op::Rename(i, name) => {
                let id = pick(&ids, i);
                let before = versions.get(&id).copied();
                let result = svc.update(id, ItemPatch::default().name(name), &cancel).await;
                // A rename to the current name is a no-op and keeps the version.
                if let (Ok(view), Some(v)) = (&result, before) {
                    if view.version == v {
                        continue;
                    }
                }
                Some((id, result))
            }
            Op::Delete(i) => {
                let id = pick(&ids, i);
                if svc.delete(id, &cancel).await.unwrap() {
                    ids.retain(|x| *x != id);
                    versions.remove(&id);
                }
                None
            }
        };

        if let Some((id, result)) = mutated {
            match result {
                Ok(view) => {
                    let before = versions[&id];
                    assert_eq!(view.version, before + 1, "mutation must bump version by one");
                    versions.insert(id, view.version);
                }
                Err(
                    RegistryError::NotFound(_)
                    | RegistryError::AlreadyClaimed { .. }
                    | RegistryError::NotClaimed(_)
                    | RegistryError::VersionConflict { .. },
                ) => {}
                Err(other) => unreachable!("unexpected error {other:?}"),
            }
        }

        let listed = svc.list(&cancel).await.unwrap();
        assert_eq!(listed.len(), ids.len());
        for view in listed {
            assert_eq!(view.is_claimed(), view.claimed_by.is_some());
            assert_eq!(view.claimed_by.is_some(), view.claimed_at.is_some());
            assert_eq!(Some(view.version), versions.get(&view.id).copied());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn claim_state_and_versions_stay_consistent(ops in prop::collection::vec(arb_op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(run(ops));
    }
}
