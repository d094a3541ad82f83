use cw_core::{
    BackendSet, ChainError, ChainResolver, CommandOutput, DesiredChain, ExecError, Executor, Policy,
    Protocol,
};
use cw_xtables::{ChainEnumerator, Reconciler};
use std::cell::RefCell;
use std::collections::HashSet;

const IPTABLES_SAVE: &str = r#"
# Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
*raw
:PREROUTING ACCEPT [12:1780]
:OUTPUT ACCEPT [19:1159]
:raw - [0:0]
COMMIT
# Completed on Mon Jan  2 01:20:06 2012
# Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
*mangle
:PREROUTING ACCEPT [12:1780]
:INPUT ACCEPT [12:1780]
:FORWARD ACCEPT [0:0]
:OUTPUT ACCEPT [19:1159]
:POSTROUTING ACCEPT [19:1159]
:mangle - [0:0]
COMMIT
# Completed on Mon Jan  2 01:20:06 2012
# Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
*nat
:PREROUTING ACCEPT [2242:639750]
:OUTPUT ACCEPT [5176:326206]
:POSTROUTING ACCEPT [5162:325382]
:mangle - [0:0]
COMMIT
# Completed on Mon Jan  2 01:20:06 2012
# Generated by iptables-save v1.4.9 on Mon Jan  2 01:20:06 2012
*filter
:INPUT ACCEPT [0:0]
:FORWARD DROP [0:0]
:OUTPUT ACCEPT [5673:420879]
:$5()*&%'"^$):  - [0:0]
COMMIT
# Completed on Mon Jan  2 01:20:06 2012
"#;

const IP6TABLES_SAVE: &str = "
# Generated by ip6tables-save v1.4.9 on Mon Jan  2 01:31:39 2012
*raw
:PREROUTING ACCEPT [2173:489241]
:OUTPUT ACCEPT [0:0]
:ff - [0:0]
COMMIT
*mangle
:PREROUTING ACCEPT [2301:518373]
:INPUT ACCEPT [0:0]
:FORWARD ACCEPT [0:0]
:OUTPUT ACCEPT [0:0]
:POSTROUTING ACCEPT [0:0]
:ff - [0:0]
COMMIT
*filter
:INPUT ACCEPT [0:0]
:FORWARD DROP [0:0]
:OUTPUT ACCEPT [20:1292]
:test - [0:0]
COMMIT
";

const EBTABLES_SAVE: &str = "
*broute
:BROUTING ACCEPT
:broute ACCEPT

*filter
:INPUT ACCEPT
:FORWARD ACCEPT
:OUTPUT ACCEPT
:filter ACCEPT
:filterdrop DROP
:filterreturn RETURN

*nat
:PREROUTING ACCEPT
:OUTPUT ACCEPT
:POSTROUTING ACCEPT
";

/// Answers save commands from fixtures and accepts every mutation
struct FixtureHost {
    ip6tables_save: &'static str,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FixtureHost {
    fn new(ip6tables_save: &'static str) -> Self {
        Self {
            ip6tables_save,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn mutations(&self) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter(|argv| !argv[0].ends_with("-save"))
            .cloned()
            .collect()
    }
}

impl Executor for FixtureHost {
    async fn execute(&self, argv: &[String]) -> Result<CommandOutput, ExecError> {
        self.calls.borrow_mut().push(argv.to_vec());
        let stdout = match argv[0].as_str() {
            "iptables-save" => IPTABLES_SAVE,
            "ip6tables-save" => self.ip6tables_save,
            "ebtables-save" => EBTABLES_SAVE,
            _ => "",
        };
        Ok(CommandOutput::success(stdout))
    }
}

#[tokio::test]
async fn enumerates_all_three_backends() {
    let host = FixtureHost::new(IP6TABLES_SAVE);
    let backends = BackendSet::standard();
    let inventory = ChainEnumerator::new(&host, &backends).enumerate().await;

    assert_eq!(inventory.for_protocol(Protocol::IPv4).count(), 17);
    assert_eq!(inventory.for_protocol(Protocol::IPv6).count(), 13);
    assert_eq!(inventory.for_protocol(Protocol::Ethernet).count(), 11);

    let keys: HashSet<String> = inventory.iter().map(|r| r.id.to_string()).collect();
    assert_eq!(keys.len(), inventory.len());
    for expected in [
        "nat:mangle:IPv4",
        "filter:$5()*&%'\"^$)::IPv4",
        "raw:ff:IPv6",
        "mangle:ff:IPv6",
        "filter:test:IPv6",
        "broute:BROUTING:ethernet",
        "nat:OUTPUT:ethernet",
        "filter:OUTPUT:ethernet",
    ] {
        assert!(keys.contains(expected), "missing {}", expected);
    }

    let resolver = ChainResolver::new();
    let odd = resolver.resolve(":$5()*&%'\"^$)::").unwrap();
    assert_eq!(inventory.get(&odd).unwrap().policy, Policy::Unset);
}

#[tokio::test]
async fn empty_ipv6_output_leaves_other_backends_intact() {
    let host = FixtureHost::new("");
    let backends = BackendSet::standard();
    let inventory = ChainEnumerator::new(&host, &backends).enumerate().await;

    assert_eq!(inventory.for_protocol(Protocol::IPv6).count(), 0);
    assert_eq!(inventory.for_protocol(Protocol::IPv4).count(), 17);
    assert_eq!(inventory.for_protocol(Protocol::Ethernet).count(), 11);
}

#[tokio::test]
async fn reconciles_a_batch_against_discovered_state() {
    let host = FixtureHost::new(IP6TABLES_SAVE);
    let backends = BackendSet::standard();
    let mut inventory = ChainEnumerator::new(&host, &backends).enumerate().await;
    let reconciler = Reconciler::new(&host, &backends);

    let desired = [
        DesiredChain::present(":test:IPv6"),
        DesiredChain::present("NAT:mangle:IPv4"),
        DesiredChain::present(":test:"),
        DesiredChain::present(":test:"),
        DesiredChain::absent("raw:ff:IPv6"),
        DesiredChain::present(":FORWARD:IPv6").with_policy(Policy::Accept),
        DesiredChain::present("BROUTE:broute:ethernet").with_policy(Policy::Drop),
    ];
    reconciler.ensure_all(&desired, &mut inventory).await.unwrap();

    assert_eq!(
        host.mutations(),
        vec![
            vec!["iptables", "-t", "filter", "-N", "test"],
            vec!["ip6tables", "-t", "raw", "-X", "ff"],
            vec!["ip6tables", "-t", "filter", "-P", "FORWARD", "ACCEPT"],
            vec!["ebtables", "-t", "broute", "-P", "broute", "DROP"],
        ]
    );

    // A second pass over the updated inventory changes nothing
    let again = reconciler.ensure_all(&desired, &mut inventory).await.unwrap();
    assert!(again.is_empty());

    let err = reconciler
        .ensure(&DesiredChain::absent("broute:BROUTING:ethernet"), &mut inventory)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::CannotRemoveBuiltin { .. }));
    assert_eq!(host.mutations().len(), 4);
}
