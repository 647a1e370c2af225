//! End-to-end marketplace flows through the engine facade

use std::collections::BTreeSet;

use agentmarket_engine::{EngineConfig, MarketEngine, MarketEvent};
use agentmarket_types::{
    AgentId, Amount, DisputeOutcome, MarketError, Page, PricingModel, PrincipalId, RequestStatus,
};

const REASON: &str = "the summary misses the entire second half of the document";

struct Market {
    engine: MarketEngine,
    owner: PrincipalId,
    payer: PrincipalId,
    agent_id: AgentId,
}

async fn market() -> Market {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let engine = MarketEngine::new(EngineConfig::default()).unwrap();
    let owner = PrincipalId::new();
    let payer = PrincipalId::new();

    let agent_id = engine
        .register_agent(
            owner.clone(),
            "summarizer".to_string(),
            "Summarizes documents".to_string(),
            BTreeSet::from(["summarization".to_string()]),
            PricingModel::PerQuery {
                price: Amount::new(100),
            },
            "https://example.com/agent".to_string(),
        )
        .await
        .unwrap();
    engine.deposit(&payer, Amount::new(1_000)).await.unwrap();

    Market {
        engine,
        owner,
        payer,
        agent_id,
    }
}

#[tokio::test]
async fn happy_path_releases_split_payment() {
    let m = market().await;

    let request = m
        .engine
        .create_request(
            m.payer.clone(),
            m.agent_id.clone(),
            Amount::new(100),
            "summarize this".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(m.engine.balance_of(&m.payer).await, Amount::new(900));

    m.engine
        .submit_result(&request.request_id, &m.owner, "the summary".to_string())
        .await
        .unwrap();
    let split = m.engine.approve(&request.request_id, &m.payer).await.unwrap();

    assert_eq!(split.creator, Amount::new(85));
    assert_eq!(split.platform, Amount::new(10));
    assert_eq!(split.treasury, Amount::new(5));
    assert_eq!(m.engine.balance_of(&m.owner).await, Amount::new(85));
    assert_eq!(
        m.engine.balance_of(&m.engine.config().platform_account).await,
        Amount::new(10)
    );
    assert_eq!(
        m.engine.balance_of(&m.engine.config().treasury_account).await,
        Amount::new(5)
    );

    let stored = m.engine.get_request(&request.request_id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Approved);

    let profile = m.engine.get_agent(&m.agent_id).await.unwrap();
    assert_eq!(profile.total_services, 1);
    assert_eq!(profile.total_earnings, Amount::new(85));
}

#[tokio::test]
async fn split_remainder_goes_to_treasury() {
    let m = market().await;

    let request = m
        .engine
        .create_request(
            m.payer.clone(),
            m.agent_id.clone(),
            Amount::new(7),
            "tiny".to_string(),
        )
        .await
        .unwrap();
    m.engine
        .submit_result(&request.request_id, &m.owner, "done".to_string())
        .await
        .unwrap();
    let split = m.engine.approve(&request.request_id, &m.payer).await.unwrap();

    // 7 * 85% truncates to 5, 7 * 10% to 0; treasury takes 2.
    assert_eq!(split.creator, Amount::new(5));
    assert_eq!(split.platform, Amount::new(0));
    assert_eq!(split.treasury, Amount::new(2));
    assert_eq!(split.total(), Amount::new(7));
}

#[tokio::test]
async fn value_is_conserved_across_a_mixed_workload() {
    let m = market().await;
    let deposited = Amount::new(1_000);
    assert_eq!(m.engine.total_value().await, deposited);

    // Approve one, cancel one, refund one through a dispute.
    let approved = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(100), "a".into())
        .await
        .unwrap();
    let cancelled = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(200), "b".into())
        .await
        .unwrap();
    let disputed = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(300), "c".into())
        .await
        .unwrap();
    assert_eq!(m.engine.total_value().await, deposited);

    m.engine
        .submit_result(&approved.request_id, &m.owner, "r".into())
        .await
        .unwrap();
    m.engine.approve(&approved.request_id, &m.payer).await.unwrap();

    m.engine.cancel(&cancelled.request_id, &m.payer).await.unwrap();

    m.engine
        .submit_result(&disputed.request_id, &m.owner, "r".into())
        .await
        .unwrap();
    let dispute = m
        .engine
        .dispute(&disputed.request_id, &m.payer, REASON.to_string())
        .await
        .unwrap();
    let arbiter = PrincipalId::new();
    m.engine
        .begin_dispute_review(&dispute.dispute_id, &arbiter)
        .await
        .unwrap();
    m.engine
        .resolve_dispute(
            &dispute.dispute_id,
            &arbiter,
            DisputeOutcome::RefundToPayer,
            "agent output was unusable".to_string(),
        )
        .await
        .unwrap();

    // Every path conserves the deposited total.
    assert_eq!(m.engine.total_value().await, deposited);
    // 1000 - 100 spent + 200 refund + 300 refund = 900.
    assert_eq!(m.engine.balance_of(&m.payer).await, Amount::new(900));
}

#[tokio::test]
async fn double_approve_is_rejected_without_double_payment() {
    let m = market().await;
    let request = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(100), "a".into())
        .await
        .unwrap();
    m.engine
        .submit_result(&request.request_id, &m.owner, "r".into())
        .await
        .unwrap();

    m.engine.approve(&request.request_id, &m.payer).await.unwrap();
    let second = m.engine.approve(&request.request_id, &m.payer).await;

    assert!(matches!(
        second,
        Err(MarketError::WrongRequestStatus { .. })
    ));
    assert_eq!(m.engine.balance_of(&m.owner).await, Amount::new(85));
}

#[tokio::test]
async fn concurrent_approve_and_dispute_admit_one_winner() {
    let m = market().await;
    let request = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(100), "a".into())
        .await
        .unwrap();
    m.engine
        .submit_result(&request.request_id, &m.owner, "r".into())
        .await
        .unwrap();

    let approve_engine = m.engine.clone();
    let dispute_engine = m.engine.clone();
    let approve_payer = m.payer.clone();
    let dispute_payer = m.payer.clone();
    let approve_id = request.request_id.clone();
    let dispute_id = request.request_id.clone();

    let (approved, disputed) = tokio::join!(
        tokio::spawn(async move { approve_engine.approve(&approve_id, &approve_payer).await }),
        tokio::spawn(async move {
            dispute_engine
                .dispute(&dispute_id, &dispute_payer, REASON.to_string())
                .await
        }),
    );
    let approved = approved.unwrap();
    let disputed = disputed.unwrap();

    assert!(approved.is_ok() ^ disputed.is_ok());

    let status = m.engine.get_request(&request.request_id).await.unwrap().status;
    if approved.is_ok() {
        assert_eq!(status, RequestStatus::Approved);
    } else {
        assert_eq!(status, RequestStatus::Disputed);
        assert_eq!(m.engine.balance_of(&m.owner).await, Amount::zero());
    }
}

#[tokio::test]
async fn deactivation_blocks_new_requests_but_not_inflight() {
    let m = market().await;
    let inflight = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(100), "a".into())
        .await
        .unwrap();

    m.engine.deactivate_agent(&m.agent_id, &m.owner).await.unwrap();

    let rejected = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(100), "b".into())
        .await;
    assert!(matches!(rejected, Err(MarketError::AgentInactive { .. })));

    // The in-flight request still completes and pays out.
    m.engine
        .submit_result(&inflight.request_id, &m.owner, "r".into())
        .await
        .unwrap();
    let split = m.engine.approve(&inflight.request_id, &m.payer).await.unwrap();
    assert_eq!(split.creator, Amount::new(85));
}

#[tokio::test]
async fn dispute_partial_split_divides_the_escrow() {
    let m = market().await;
    let request = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(200), "a".into())
        .await
        .unwrap();
    m.engine
        .submit_result(&request.request_id, &m.owner, "r".into())
        .await
        .unwrap();
    let dispute = m
        .engine
        .dispute(&request.request_id, &m.payer, REASON.to_string())
        .await
        .unwrap();

    let arbiter = PrincipalId::new();
    m.engine
        .begin_dispute_review(&dispute.dispute_id, &arbiter)
        .await
        .unwrap();
    let applied = m
        .engine
        .resolve_dispute(
            &dispute.dispute_id,
            &arbiter,
            DisputeOutcome::PartialSplit { agent_pct: 50 },
            "both sides share the fault".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(applied.released.total(), Amount::new(100));
    assert_eq!(applied.refunded, Amount::new(100));
    assert_eq!(m.engine.balance_of(&m.payer).await, Amount::new(900));
    assert_eq!(m.engine.total_value().await, Amount::new(1_000));
}

#[tokio::test]
async fn rating_is_payment_gated_and_single_shot() {
    let m = market().await;
    let request = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(100), "a".into())
        .await
        .unwrap();
    m.engine
        .submit_result(&request.request_id, &m.owner, "r".into())
        .await
        .unwrap();

    // No rating before approval.
    let early = m
        .engine
        .submit_rating(&request.request_id, &m.payer, 5, None, None, None, None)
        .await;
    assert!(matches!(early, Err(MarketError::WrongRequestStatus { .. })));

    m.engine.approve(&request.request_id, &m.payer).await.unwrap();

    // Only the payer may rate.
    let outsider = m
        .engine
        .submit_rating(&request.request_id, &m.owner, 5, None, None, None, None)
        .await;
    assert!(matches!(outsider, Err(MarketError::NotPayer { .. })));

    m.engine
        .submit_rating(&request.request_id, &m.payer, 4, Some(4), None, None, None)
        .await
        .unwrap();
    let duplicate = m
        .engine
        .submit_rating(&request.request_id, &m.payer, 1, None, None, None, None)
        .await;
    assert!(matches!(duplicate, Err(MarketError::DuplicateRating { .. })));

    let profile = m.engine.get_agent(&m.agent_id).await.unwrap();
    assert_eq!(profile.reputation_score, 400);
    assert_eq!(profile.total_ratings, 1);
    assert!((profile.reputation_stars() - 4.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn events_are_emitted_for_the_full_lifecycle() {
    let m = market().await;
    let mut events = m.engine.subscribe();

    let request = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::new(100), "a".into())
        .await
        .unwrap();
    m.engine
        .submit_result(&request.request_id, &m.owner, "r".into())
        .await
        .unwrap();
    m.engine.approve(&request.request_id, &m.payer).await.unwrap();
    m.engine
        .submit_rating(&request.request_id, &m.payer, 5, None, None, None, None)
        .await
        .unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        MarketEvent::RequestCreated { amount, .. } if amount == Amount::new(100)
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        MarketEvent::ResultSubmitted { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        MarketEvent::PaymentReleased { split, .. } if split.creator == Amount::new(85)
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        MarketEvent::RatingSubmitted { stars: 5, .. }
    ));
}

#[tokio::test]
async fn request_listings_are_paginated_newest_first() {
    let m = market().await;
    for i in 0..3 {
        m.engine
            .create_request(
                m.payer.clone(),
                m.agent_id.clone(),
                Amount::new(10 + i),
                format!("task {}", i),
            )
            .await
            .unwrap();
    }

    let first_page = m
        .engine
        .requests_for_agent(&m.agent_id, Page::new(1, 2).unwrap())
        .await;
    assert_eq!(first_page.len(), 2);
    assert!(first_page[0].created_at >= first_page[1].created_at);

    let second_page = m
        .engine
        .requests_for_agent(&m.agent_id, Page::new(2, 2).unwrap())
        .await;
    assert_eq!(second_page.len(), 1);

    let by_payer = m.engine.requests_for_payer(&m.payer, Page::default()).await;
    assert_eq!(by_payer.len(), 3);
}

#[tokio::test]
async fn ceilings_and_funding_are_enforced_at_creation() {
    let m = market().await;

    let broke = PrincipalId::new();
    let unfunded = m
        .engine
        .create_request(broke, m.agent_id.clone(), Amount::new(100), "a".into())
        .await;
    assert!(matches!(
        unfunded,
        Err(MarketError::InsufficientFunds { .. })
    ));

    let zero = m
        .engine
        .create_request(m.payer.clone(), m.agent_id.clone(), Amount::zero(), "a".into())
        .await;
    assert!(matches!(zero, Err(MarketError::NonPositiveAmount)));

    let over = m
        .engine
        .create_request(
            m.payer.clone(),
            m.agent_id.clone(),
            Amount::new(u64::MAX),
            "a".into(),
        )
        .await;
    assert!(matches!(over, Err(MarketError::AmountAboveCeiling { .. })));
}
