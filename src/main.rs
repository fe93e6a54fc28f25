extern crate log;
extern crate pretty_env_logger;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;
use kyber_rs::{
    encoding::BinaryMarshaler,
    group::edwards25519::{Point, SuiteEd25519},
    util::key::new_key_pair,
};
use mediator_vss::{
    dkg::{committee_order, new_committee_dkgs},
    Address, LoggingSigner, StaticCommittee, VssConfig, VssProtocol,
};

/// Runs one VSS term for an in-process mediator committee.
#[derive(Parser, Debug)]
#[command(author, version, about = "mediator vss", long_about = None)]
struct DemoArgs {
    #[arg(short = 'n', long = "committee-size", default_value = "4")]
    committee_size: usize,

    /// members controlled by this process, all of them when unset
    #[arg(short, long, default_value = None)]
    local: Option<usize>,

    /// overrides the configured session timeout, in seconds
    #[arg(short = 't', long = "session-timeout", default_value = None)]
    session_timeout: Option<u64>,

    #[arg(short, long, default_value = None)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = DemoArgs::parse();
    if !run(args).await? {
        bail!("not every local mediator got certified");
    }
    Ok(())
}

fn address_of(public: &Point) -> Result<Address> {
    Ok(Address::new(format!(
        "P1{}",
        hex::encode(public.marshal_binary()?)
    )))
}

/// Returns whether every local mediator got certified before the session
/// timed out.
async fn run(args: DemoArgs) -> Result<bool> {
    if args.committee_size < 3 {
        bail!("a committee needs at least 3 mediators");
    }
    let mut config = match &args.config {
        Some(path) => VssConfig::load(path)?,
        None => VssConfig::from_env(),
    };
    if let Some(secs) = args.session_timeout {
        config.session_timeout_secs = secs;
    }

    log::info!("generating {} mediator keypairs", args.committee_size);
    let suite = SuiteEd25519::new_blake3_sha256_ed25519();
    let mut keys = Vec::with_capacity(args.committee_size);
    for _ in 0..args.committee_size {
        keys.push(new_key_pair(&suite)?);
    }
    let publics: Vec<Point> = keys.iter().map(|k| k.public.clone()).collect();
    let members = committee_order(&publics)
        .iter()
        .map(address_of)
        .collect::<Result<Vec<_>>>()?;

    let local_count = args.local.unwrap_or(args.committee_size).min(args.committee_size);
    let dkgs = new_committee_dkgs(&keys[..local_count], &publics)?;
    let locals: Vec<Address> = dkgs
        .iter()
        .map(|dkg| members[dkg.index() as usize].clone())
        .collect();

    let committee = StaticCommittee::new(members.clone(), locals.clone());
    let protocol = VssProtocol::new(config.clone(), Arc::new(committee), Arc::new(LoggingSigner));
    for (dkg, local) in dkgs.into_iter().zip(&locals) {
        log::debug!("{}: {}", local.short(), dkg);
        protocol.add_session(local.clone(), dkg);
    }
    protocol.start()?;

    let deadline = tokio::time::Instant::now() + config.session_timeout();
    while !locals.iter().all(|m| protocol.is_certified(m))
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let mut all_certified = true;
    for local in &locals {
        if protocol.is_certified(local) {
            log::info!("mediator {} {}", local.short(), "certified".green());
        } else {
            all_certified = false;
            log::warn!("mediator {} {}", local.short(), "not certified".red());
        }
        for dealer in &members {
            log::debug!(
                "  regarding {}: {}",
                dealer.short(),
                protocol.dealer_status(local, dealer)
            );
        }
    }
    protocol.quit();
    Ok(all_certified)
}

#[tokio::test(flavor = "multi_thread")]
async fn three_member_committee_certifies() {
    let args = DemoArgs {
        committee_size: 3,
        local: None,
        session_timeout: Some(20),
        config: None,
    };
    assert!(run(args).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn four_member_committee_certifies() {
    let args = DemoArgs {
        committee_size: 4,
        local: None,
        session_timeout: Some(20),
        config: None,
    };
    assert!(run(args).await.unwrap());
}

#[test]
fn addresses_keep_the_whole_key() {
    let suite = SuiteEd25519::new_blake3_sha256_ed25519();
    let first = new_key_pair(&suite).unwrap();
    let second = new_key_pair(&suite).unwrap();

    let address = address_of(&first.public).unwrap();
    assert_eq!(address.to_string().len(), 2 + 64);
    assert_ne!(address, address_of(&second.public).unwrap());
    assert_ne!(address.short(), address_of(&second.public).unwrap().short());
}

#[test]
fn tiny_committee_is_refused() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let args = DemoArgs {
        committee_size: 2,
        local: None,
        session_timeout: Some(1),
        config: None,
    };
    assert!(runtime.block_on(run(args)).is_err());
}
