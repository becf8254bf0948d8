//! Simple test to verify compilation and basic functionality

use ballotbox::{
    PollState, Result, VotingSystem,
    api::{
        CreateCandidateRequest, CreatePollRequest, LoginRequest, RegisterRequest,
        VerifyOtpRequest, VoteRequest,
    },
    clock::ManualClock,
    config::Config,
    notify::RecordingNotifier,
    store::VoterStore,
    types::Role,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;

#[tokio::test]
async fn test_basic_compilation() -> Result<()> {
    println!("🔧 Testing basic compilation and functionality...");

    // Test configuration
    let config = Config::for_testing();
    assert!(config.otp.ttl_seconds > 0);
    assert!(config.registration.phone_regex()?.is_match("+998901234567"));
    println!("✅ Configuration works");

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap()));
    let notifier = Arc::new(RecordingNotifier::new());
    let system = VotingSystem::for_testing(clock.clone(), notifier.clone())?;
    println!("✅ Voting system wiring works");

    // Registration and phone verification
    let phone = "+998901234567";
    system.register(&RegisterRequest {
        first_name: "Dilnoza".into(),
        last_name: "Karimova".into(),
        phone: phone.into(),
        password: "p4ssw0rd".into(),
        role: Some(Role::Staff),
    })?;
    let otp = notifier.last_code(phone).expect("code delivered");
    system.verify_otp(&VerifyOtpRequest { phone: phone.into(), otp })?;
    println!("✅ Registration and OTP verification work");

    let pair = system.login(&LoginRequest {
        phone: phone.into(),
        password: "p4ssw0rd".into(),
    })?;
    let me = system.authenticate(&pair.access)?;
    assert!(me.is_staff());
    assert_eq!(system.store().voter(me.id)?.map(|v| v.phone_verified), Some(true));
    println!("✅ Login and bearer authentication work");

    // One poll, one candidate, one ballot
    let poll = system.create_poll(&me, &CreatePollRequest {
        title: "Smoke".into(),
        description: "Smoke test poll".into(),
        ..Default::default()
    })?;
    let candidate = system.create_candidate(&me, &CreateCandidateRequest {
        poll_id: Some(poll.id),
        name: "Only".into(),
        info: String::new(),
    })?;
    assert_eq!(poll.state(system.now()), PollState::Open);

    system.cast_vote(&me, &VoteRequest {
        poll_id: Some(poll.id),
        candidate_id: Some(candidate.id),
    })?;
    tokio_test::assert_err!(system.cast_vote(&me, &VoteRequest {
        poll_id: Some(poll.id),
        candidate_id: Some(candidate.id),
    }));
    let tally = tokio_test::assert_ok!(system.tally(poll.id));
    assert_eq!(tally.total_votes, 1);
    assert_eq!(tally.winner_id(), Some(candidate.id));
    println!("✅ Voting and tallying work");

    let (_, purged_tokens) = tokio_test::assert_ok!(system.purge_expired_credentials());
    assert_eq!(purged_tokens, 0);

    println!("🎉 All basic functionality verified!");
    Ok(())
}
