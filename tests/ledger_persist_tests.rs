//! Persisted-ledger round-trip over a real multi-hop conversation.

use pretty_assertions::assert_eq;

use oxymas::prelude::*;

async fn run_conversation() -> Mas {
    let mas = Mas::new(MasConfig::default());
    mas.register_oxy(
        "lookup_tool",
        Capability::Tool,
        FnOxy::shared(|invocation, _ctx| async move {
            Ok(Payload::json(serde_json::json!({
                "echo": invocation.payload.as_text()
            })))
        }),
    );
    mas.register_oxy(
        "qa_agent",
        Capability::Agent,
        FnOxy::shared(|invocation, ctx| async move {
            let q = invocation.text().unwrap_or_default().to_string();
            ctx.call_tool("lookup_tool", serde_json::json!({ "q": q })).await?;
            Ok(Payload::text(format!("answer to {q}")))
        }),
    );

    mas.submit_message("s1", "qa_agent", "first").await.unwrap();
    mas.submit_message("s1", "qa_agent", "second").await.unwrap();
    mas
}

#[tokio::test]
async fn json_round_trip_reproduces_exact_sequence() {
    let mas = run_conversation().await;
    let session = mas.get_session(&SessionId::new("s1")).unwrap();

    let snapshot = session.ledger().export();
    let json = snapshot.to_json().unwrap();
    let reloaded = LedgerSnapshot::from_json(&json).unwrap();
    let restored = Ledger::restore(reloaded).unwrap();

    let original = session.ledger().messages();
    let replayed = restored.messages();
    assert_eq!(original.len(), replayed.len());
    for (a, b) in original.iter().zip(replayed.iter()) {
        assert_eq!(**a, **b);
    }
    // Causal links survive the round trip.
    assert!(replayed
        .iter()
        .filter(|m| m.causal_parent.is_some())
        .count() > 0);
    for m in &replayed {
        if let Some(parent) = m.causal_parent {
            assert!(parent < m.id);
        }
    }
}

#[tokio::test]
async fn restored_session_continues_the_conversation() {
    let mas = run_conversation().await;
    let session = mas.get_session(&SessionId::new("s1")).unwrap();
    let before = session.ledger().len();

    let restored = Ledger::restore(session.ledger().export()).unwrap();
    let resumed = Session::with_ledger(SessionId::new("s1"), restored);

    let (_, next) = resumed
        .begin_turn(MessageDraft::user_text("qa_agent", "third"))
        .unwrap();
    assert_eq!(next.id.0 as usize, before);
}

#[tokio::test]
async fn snapshot_includes_failed_turn_audit_trail() {
    let mas = Mas::new(MasConfig::default());
    mas.register_oxy(
        "half_agent",
        Capability::Agent,
        FnOxy::shared(|_invocation, ctx| async move {
            ctx.call_tool("absent_tool", serde_json::json!({})).await?;
            Ok(Payload::Empty)
        }),
    );

    let result = mas.submit_message("s1", "half_agent", "go").await.unwrap();
    assert_eq!(result.status, TurnStatus::Failed);

    let session = mas.get_session(&SessionId::new("s1")).unwrap();
    let snapshot = session.ledger().export();
    // The initiating message and the dangling outbound hop are both kept.
    assert_eq!(snapshot.messages.len(), 2);
    let restored = Ledger::restore(snapshot).unwrap();
    assert_eq!(restored.len(), 2);
}
