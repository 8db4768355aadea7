mod common;

use anchor_lang::prelude::Pubkey;

use common::{assert_error, OracleKeys, Setup};
use offchain_aggregator::{
    config_digest_from_data, ConfigReader, ErrorCode, Event, SigningKey,
};

fn committee(n: u8) -> (Vec<SigningKey>, Vec<Pubkey>) {
    let signers = (0..n)
        .map(|i| SigningKey::from([i.wrapping_add(100); 20]))
        .collect();
    let transmitters = (0..n).map(|_| Pubkey::new_unique()).collect();
    (signers, transmitters)
}

/// Assigns a fresh payee to every transmitter.
fn with_payees(setup: &mut Setup, transmitters: &[Pubkey]) {
    let payees: Vec<_> = transmitters.iter().map(|_| Pubkey::new_unique()).collect();
    setup
        .aggregator
        .set_payees(&setup.env, transmitters, &payees)
        .unwrap();
}

#[test]
fn digest_matches_offchain_computation() {
    let setup = Setup::new();
    let signers: Vec<_> = setup.oracles.iter().map(|o| o.signer).collect();
    let transmitters: Vec<_> = setup.oracles.iter().map(|o| o.transmitter).collect();

    let expected = config_digest_from_data(
        &setup.aggregator.address(),
        1,
        &signers,
        &transmitters,
        1,
        1,
        b"offchain",
    );
    let details = setup.aggregator.latest_config_details();
    assert_eq!(details.config_digest, expected);
    assert_eq!(details.config_count, 1);
    assert_eq!(details.block_number, setup.env.block_number);
}

#[test]
fn config_event_carries_previous_block() {
    let mut setup = Setup::new();
    let (signers, transmitters) = committee(4);
    with_payees(&mut setup, &transmitters);

    let env = setup.env.at_block(42, 1_700_000_000);
    setup
        .aggregator
        .set_config(&env, &signers, &transmitters, 1, 2, b"next".to_vec())
        .unwrap();

    let entry = setup.aggregator.events().latest().unwrap();
    assert_eq!(entry.block_number, 42);
    match &entry.event {
        Event::ConfigSet {
            previous_config_block_number,
            config_count,
            signers: event_signers,
            transmitters: event_transmitters,
            threshold,
            encoded_config_version,
            encoded_config,
            ..
        } => {
            assert_eq!(*previous_config_block_number, setup.env.block_number);
            assert_eq!(*config_count, 2);
            assert_eq!(event_signers.len(), 4);
            assert_eq!(event_signers[0], signers[0].key);
            assert_eq!(event_transmitters, &transmitters);
            assert_eq!(*threshold, 1);
            assert_eq!(*encoded_config_version, 2);
            assert_eq!(encoded_config, b"next");
        }
        event => panic!("unexpected event {:?}", event),
    }
    assert_eq!(setup.aggregator.latest_config_details().block_number, 42);
}

#[test]
fn replacement_is_total() {
    let mut setup = Setup::new();
    let report = setup.report(5, 3, &[2, 3], vec![1, 2]);
    setup.submit(&report, &[2, 3], 2).unwrap();
    assert_eq!(
        setup
            .aggregator
            .oracle_observation_count(&setup.oracles[2].transmitter),
        1
    );

    // keep oracles 2 and 3, drop 0 and 1, add four new ones
    let newcomers: Vec<_> = (50..54).map(OracleKeys::generate).collect();
    let transmitters: Vec<_> = newcomers.iter().map(|o| o.transmitter).collect();
    let payees: Vec<_> = newcomers.iter().map(|o| o.payee).collect();
    setup
        .aggregator
        .set_payees(&setup.env, &transmitters, &payees)
        .unwrap();

    let old = setup.oracles.drain(..).collect::<Vec<_>>();
    let mut oracles: Vec<_> = old.into_iter().skip(2).collect();
    oracles.extend(newcomers);
    let signers: Vec<_> = oracles.iter().map(|o| o.signer).collect();
    let transmitters: Vec<_> = oracles.iter().map(|o| o.transmitter).collect();
    setup
        .aggregator
        .set_config(&setup.env, &signers, &transmitters, 1, 1, vec![])
        .unwrap();
    setup.oracles = oracles;

    // epochs restart under the new digest
    let details = setup.aggregator.latest_transmission_details();
    assert_eq!((details.epoch, details.round), (0, 0));
    assert_eq!(setup.aggregator.transmitters(), transmitters);
    // counters reset
    assert_eq!(
        setup
            .aggregator
            .oracle_observation_count(&setup.oracles[0].transmitter),
        0
    );

    let report = setup.report(1, 1, &[0, 1], vec![1, 2]);
    assert_eq!(setup.submit(&report, &[0, 1], 0).unwrap(), 2);
}

#[test]
fn removed_oracles_lose_privileges() {
    let mut setup = Setup::new();
    let (signers, transmitters) = committee(4);
    with_payees(&mut setup, &transmitters);
    setup
        .aggregator
        .set_config(&setup.env, &signers, &transmitters, 1, 1, vec![])
        .unwrap();

    // the old committee can no longer sign or submit
    let report = setup.report(1, 1, &[0, 1], vec![1, 2]);
    assert_error(
        setup.submit(&report, &[0, 1], 0),
        ErrorCode::UnauthorizedSigner,
    );
}

#[test]
fn only_owner_sets_config() {
    let mut setup = Setup::new();
    let (signers, transmitters) = committee(4);
    with_payees(&mut setup, &transmitters);

    let env = setup.env.with_sender(Pubkey::new_unique());
    assert_error(
        setup
            .aggregator
            .set_config(&env, &signers, &transmitters, 1, 1, vec![]),
        ErrorCode::Unauthorized,
    );
}

#[test]
fn committee_shape_is_validated() {
    let mut setup = Setup::new();
    let (signers, transmitters) = committee(32);
    with_payees(&mut setup, &transmitters);
    let env = setup.env;
    let aggregator = &mut setup.aggregator;

    assert_error(
        aggregator.set_config(&env, &[], &[], 1, 1, vec![]),
        ErrorCode::InvalidInput,
    );
    assert_error(
        aggregator.set_config(&env, &signers, &transmitters, 1, 1, vec![]),
        ErrorCode::TooManyOracles,
    );
    assert_error(
        aggregator.set_config(&env, &signers[..4], &transmitters[..3], 1, 1, vec![]),
        ErrorCode::OracleLengthMismatch,
    );
    assert_error(
        aggregator.set_config(&env, &signers[..4], &transmitters[..4], 0, 1, vec![]),
        ErrorCode::InvalidInput,
    );
    // 3 * 1 < 3 doesn't hold
    assert_error(
        aggregator.set_config(&env, &signers[..3], &transmitters[..3], 1, 1, vec![]),
        ErrorCode::ThresholdTooHigh,
    );
    assert_error(
        aggregator.set_config(&env, &signers[..6], &transmitters[..6], 2, 1, vec![]),
        ErrorCode::ThresholdTooHigh,
    );

    // the largest committee is accepted
    aggregator
        .set_config(&env, &signers[..31], &transmitters[..31], 10, 1, vec![])
        .unwrap();
}

#[test]
fn duplicates_are_rejected() {
    let mut setup = Setup::new();
    let (mut signers, mut transmitters) = committee(4);
    with_payees(&mut setup, &transmitters);
    let env = setup.env;

    let original = signers[1];
    signers[1] = signers[0];
    assert_error(
        setup
            .aggregator
            .set_config(&env, &signers, &transmitters, 1, 1, vec![]),
        ErrorCode::DuplicateSigner,
    );
    signers[1] = original;

    transmitters[3] = transmitters[2];
    assert_error(
        setup
            .aggregator
            .set_config(&env, &signers, &transmitters, 1, 1, vec![]),
        ErrorCode::DuplicateTransmitter,
    );
}

#[test]
fn transmitters_need_a_payee() {
    let mut setup = Setup::new();
    let (signers, transmitters) = committee(4);
    let env = setup.env;
    let before = setup.aggregator.latest_config_details();

    assert_error(
        setup
            .aggregator
            .set_config(&env, &signers, &transmitters, 1, 1, vec![]),
        ErrorCode::PayeeNotSet,
    );
    // nothing changed
    assert_eq!(setup.aggregator.latest_config_details(), before);
}
