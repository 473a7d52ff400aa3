use crate::*;

use lantern_core::wire::{MAP_KEY, PORT_KEY, SIGNATURE_KEY};

/// Generous budget: each tick is followed by a 5 ms sleep, so this is
/// about a second of wall time before a test gives up.
const MAX_TICKS: usize = 200;

#[test]
fn end_to_end_discovery() -> anyhow::Result<()> {
    let port = free_port();
    let mut host = DiscoveryEngine::new(config_for(port, 7777, "Arena", identity("acme")));
    let mut seeker = DiscoveryEngine::new(config_for(port, 7778, "", identity("acme")));

    host.ensure_advertiser()?;
    let discovered = collect_discoveries(&mut seeker);

    seeker.send_direct(loopback(port))?;
    assert!(
        pump_until(&mut host, &mut seeker, || !discovered.borrow().is_empty(), MAX_TICKS),
        "no peer discovered within deadline"
    );

    let records = discovered.borrow();
    assert_eq!(records.len(), 1, "expected exactly one notification");

    let record = &records[0];
    assert_eq!(record.source(), loopback(port), "source must be the host's bound address");
    assert_eq!(record.fields().get(SIGNATURE_KEY), Some(seeker.signature()));
    assert_eq!(record.fields().get(PORT_KEY), Some("7777"));
    assert_eq!(record.fields().get(MAP_KEY), Some("Arena"));
    assert_eq!(record.try_advertised_port(), Some(7777));
    assert_eq!(record.advertised_port()?, 7777);
    Ok(())
}

#[test]
fn duplicate_responses_are_each_delivered() -> anyhow::Result<()> {
    let port = free_port();
    let mut host = DiscoveryEngine::new(config_for(port, 7777, "Arena", identity("acme")));
    let mut seeker = DiscoveryEngine::new(config_for(port, 7778, "", identity("acme")));

    host.ensure_advertiser()?;
    let discovered = collect_discoveries(&mut seeker);

    // two requests, two responses, two notifications; merging records
    // from the same source is the consumer's job
    seeker.send_direct(loopback(port))?;
    assert!(pump_until(&mut host, &mut seeker, || !discovered.borrow().is_empty(), MAX_TICKS));
    seeker.send_direct(loopback(port))?;
    assert!(
        pump_until(&mut host, &mut seeker, || discovered.borrow().len() >= 2, MAX_TICKS),
        "second response not delivered"
    );

    let records = discovered.borrow();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source(), records[1].source());
    Ok(())
}

#[test]
fn mismatched_identity_never_surfaces() -> anyhow::Result<()> {
    let port = free_port();
    let mut host = DiscoveryEngine::new(config_for(port, 7777, "Arena", identity("acme")));
    let mut seeker = DiscoveryEngine::new(config_for(port, 7778, "", identity("rival")));

    host.ensure_advertiser()?;
    let discovered = collect_discoveries(&mut seeker);

    seeker.send_direct(loopback(port))?;
    // run a bounded pump; the condition never becomes true
    assert!(
        !pump_until(&mut host, &mut seeker, || !discovered.borrow().is_empty(), 40),
        "peer with a different identity must not be discovered"
    );
    Ok(())
}

#[test]
fn registration_changes_reach_the_next_response() -> anyhow::Result<()> {
    let port = free_port();
    let mut host = DiscoveryEngine::new(config_for(port, 7777, "Arena", identity("acme")));
    let mut seeker = DiscoveryEngine::new(config_for(port, 7778, "", identity("acme")));

    host.ensure_advertiser()?;
    let discovered = collect_discoveries(&mut seeker);

    seeker.send_direct(loopback(port))?;
    assert!(pump_until(&mut host, &mut seeker, || !discovered.borrow().is_empty(), MAX_TICKS));
    assert_eq!(discovered.borrow()[0].fields().get(MAP_KEY), Some("Arena"));

    // the store is read in full per response, so this is visible at once
    host.register_field("Map", "Lobby");
    seeker.send_direct(loopback(port))?;
    assert!(pump_until(&mut host, &mut seeker, || discovered.borrow().len() >= 2, MAX_TICKS));
    assert_eq!(discovered.borrow()[1].fields().get(MAP_KEY), Some("Lobby"));
    Ok(())
}

#[test]
fn shutdown_host_stops_answering() -> anyhow::Result<()> {
    let port = free_port();
    let mut host = DiscoveryEngine::new(config_for(port, 7777, "Arena", identity("acme")));
    let mut seeker = DiscoveryEngine::new(config_for(port, 7778, "", identity("acme")));

    host.ensure_advertiser()?;
    let discovered = collect_discoveries(&mut seeker);

    seeker.send_direct(loopback(port))?;
    assert!(pump_until(&mut host, &mut seeker, || !discovered.borrow().is_empty(), MAX_TICKS));

    host.shutdown();
    seeker.send_direct(loopback(port))?;
    assert!(
        !pump_until(&mut host, &mut seeker, || discovered.borrow().len() >= 2, 40),
        "a closed advertiser must not answer"
    );
    Ok(())
}
