//! The probe catalogue.
//!
//! Every command and file the collector touches is listed here. The order of
//! [`catalogue`] is the emission order.

use crate::config::HostinfoConfig;
use crate::policy::Assessment;
use crate::probe::{Accept, Probe, Source, Step, Strategy};
use hostinfo_canon::patterns::{
    COMMENT_LINE, DOUBLE_QUOTE, FIRST_FIELD, HARDWARE_FIELD, IFCONFIG_INET_LINE, IP_ADDR_ROW,
    OS_PRETTY_NAME, PACKAGE_REPO_SUFFIX, PASSWD_USERNAME, PROC_NET_DEV_ROW, SUDOERS_DEFAULTS,
    SUDOERS_INCLUDE,
};
use hostinfo_canon::{KeyStyle, Matcher, RuleSet, Sequencing};

/// Accounts reported as service accounts whatever their shell.
pub const RESERVED_ACCOUNTS: [&str; 4] = ["root", "sync", "shutdown", "halt"];

/// Shell markers of a non-interactive account.
pub const SERVICE_SHELLS: [&str; 2] = ["nologin", "/bin/false"];

pub mod fields {
    pub const OS: &str = "OS";
    pub const PACKAGES: &str = "Installed_Packages";
    pub const TIME: &str = "Time";
    pub const INTERFACES: &str = "Interface_Names";
    pub const PRIMARY_IP: &str = "Primary_IP";
    pub const ADDRESSES: &str = "All_Interface_Address_Info";
    pub const MAC: &str = "MAC_Address(es)";
    pub const HARDWARE: &str = "Hardware_Info";
    pub const SOCKETS: &str = "Active_Sockets";
    pub const SELINUX: &str = "SELinuxstatus";
    pub const USERS: &str = "User_Accounts";
    pub const MONIKERS: &str = "Monikers";
    pub const SERVICE_ACCOUNTS: &str = "Service_Accounts";
    pub const SUDOERS: &str = "Sudoers_Entries";
    pub const ROOT_PASSWORD: &str = "Root_Password_Status";
}

/// All probes, in emission order.
pub fn catalogue(config: &HostinfoConfig) -> Vec<Probe> {
    vec![
        os(config),
        packages(),
        time(),
        interfaces(config),
        primary_ip(),
        addresses(),
        mac(),
        hardware(config),
        sockets(),
        selinux(),
        users(config),
        monikers(config),
        service_accounts(config),
        sudoers(config),
        root_password(config),
    ]
}

fn command(argv: &[&str]) -> Step {
    Step::new(Source::command(argv), Accept::NonEmpty)
}

fn shell(script: &str) -> Step {
    Step::new(Source::shell(script), Accept::NonEmpty)
}

fn uname_steps(strategy: Strategy) -> Strategy {
    [
        ("-s", "Kernel_Name"),
        ("-n", "Node_Name"),
        ("-r", "Kernel_Release"),
        ("-v", "Kernel_Version"),
        ("-m", "Machine"),
    ]
    .into_iter()
    .fold(strategy, |s, (flag, tag)| {
        s.step(command(&["uname", flag]).tagged(tag).optional(None))
    })
}

fn os(config: &HostinfoConfig) -> Probe {
    let os_release = RuleSet::pairs("=", KeyStyle::Underscore)
        .keep(vec![Matcher::starts_with("PRETTY_NAME=")])
        .replace(&OS_PRETTY_NAME, "OS=")
        .replace(&DOUBLE_QUOTE, "");
    let redhat_release = RuleSet::listing(fields::OS, " ").collapse_whitespace();

    Probe::new("os", fields::OS)
        .strategy(uname_steps(
            Strategy::new("os-release + uname", os_release).step(Step::new(
                Source::file(&config.paths.os_release),
                Accept::NonEmpty,
            )),
        ))
        .strategy(uname_steps(
            Strategy::new("redhat-release + uname", redhat_release).step(Step::new(
                Source::file(&config.paths.redhat_release),
                Accept::NonEmpty,
            )),
        ))
}

fn packages() -> Probe {
    let rules = RuleSet::columns(0, 1)
        .skip_through(Matcher::contains("Installed Packages"))
        .join_indented()
        .collapse_whitespace()
        .replace(&PACKAGE_REPO_SUFFIX, "");

    Probe::new("packages", fields::PACKAGES)
        .strategy(Strategy::single(
            Step::new(Source::command(&["yum", "list", "installed"]), Accept::ExitZero),
            rules,
        ))
        .sequencing(Sequencing::Always)
}

fn time() -> Probe {
    let timedatectl = RuleSet::pairs(": ", KeyStyle::Underscore)
        .collapse_whitespace()
        .take(8);

    Probe::new("time", fields::TIME)
        .strategy(Strategy::single(command(&["timedatectl"]), timedatectl))
        .strategy(
            Strategy::new("hwclock + ntpstat", RuleSet::listing(fields::TIME, " "))
                .step(command(&["hwclock"]).tagged("Time"))
                .step(
                    Step::new(Source::command(&["ntpstat"]), Accept::AnyOutput)
                        .tagged("NTP_synchronized")
                        .optional(Some("no")),
                ),
        )
}

fn interfaces(config: &HostinfoConfig) -> Probe {
    let listing = || RuleSet::listing(fields::INTERFACES, ",").collapse_whitespace();

    Probe::new("interfaces", fields::INTERFACES)
        .strategy(Strategy::single(
            Step::new(Source::InterfaceNames, Accept::NonEmpty),
            listing(),
        ))
        .strategy(Strategy::single(
            Step::new(Source::dir(&config.paths.sys_class_net), Accept::NonEmpty),
            listing(),
        ))
        .strategy(Strategy::single(
            Step::new(Source::file(&config.paths.proc_net_dev), Accept::NonEmpty),
            RuleSet::listing(fields::INTERFACES, ",")
                .skip_lines(2)
                .keep(vec![Matcher::pattern(&PROC_NET_DEV_ROW)])
                .replace(&PROC_NET_DEV_ROW, "$1")
                .collapse_whitespace(),
        ))
        .strategy(Strategy::single(
            shell("ifconfig | grep mtu | awk -F':' '{print $1}'"),
            listing(),
        ))
        .strategy(Strategy::single(
            shell("ifconfig | grep 'Link encap:' | awk '{print $1}'"),
            listing(),
        ))
}

fn primary_ip() -> Probe {
    Probe::new("primary_ip", fields::PRIMARY_IP).strategy(Strategy::single(
        command(&["hostname", "--all-ip-addresses"]),
        RuleSet::listing(fields::PRIMARY_IP, " ")
            .drop_blank()
            .take(1)
            .replace(&FIRST_FIELD, "$1"),
    ))
}

fn addresses() -> Probe {
    let listing = || RuleSet::listing(fields::ADDRESSES, ", ");

    Probe::new("addresses", fields::ADDRESSES)
        .strategy(Strategy::single(
            Step::new(Source::InterfaceAddresses, Accept::NonEmpty),
            listing(),
        ))
        .strategy(Strategy::single(
            command(&["ip", "-o", "addr", "show"]),
            listing()
                .keep(vec![Matcher::pattern(&IP_ADDR_ROW)])
                .replace(&IP_ADDR_ROW, "$1 $2 $3"),
        ))
        .strategy(Strategy::single(
            command(&["ifconfig", "-a"]),
            listing()
                .keep(vec![Matcher::pattern(&IFCONFIG_INET_LINE)])
                .replace(&IFCONFIG_INET_LINE, "$1 $2"),
        ))
}

fn mac() -> Probe {
    let listing = || RuleSet::listing(fields::MAC, ", ").collapse_whitespace();

    Probe::new("mac", fields::MAC)
        .strategy(Strategy::single(
            shell("ifconfig | grep ether | awk '{print $2}'"),
            listing(),
        ))
        .strategy(Strategy::single(
            shell("ifconfig | grep HWaddr | awk '{print $5}'"),
            listing(),
        ))
}

fn hardware(config: &HostinfoConfig) -> Probe {
    let rules = || {
        RuleSet::pairs(": ", KeyStyle::Squash)
            .drop(vec![Matcher::contains("Not Specified")])
            .keep(vec![Matcher::pattern(&HARDWARE_FIELD)])
            .collapse_whitespace()
            .dedup()
    };

    Probe::new("hardware", fields::HARDWARE)
        .strategy(Strategy::single(
            Step::new(Source::file(&config.paths.dmidump), Accept::NonEmpty),
            rules(),
        ))
        .strategy(Strategy::single(
            command(&["dmidecode", "--type", "0,1,3"]),
            rules(),
        ))
}

fn sockets() -> Probe {
    let rules = || {
        RuleSet::listing(fields::SOCKETS, "; ")
            .drop(vec![
                Matcher::contains("netstat: no support"),
                Matcher::starts_with("Active Internet connections"),
                Matcher::starts_with("Proto "),
                Matcher::starts_with("Netid "),
            ])
            .collapse_whitespace()
    };

    Probe::new("sockets", fields::SOCKETS)
        .strategy(Strategy::single(
            command(&["netstat", "-noplv", "--inet"]),
            rules(),
        ))
        .strategy(Strategy::single(command(&["ss", "-lntup"]), rules()))
}

fn selinux() -> Probe {
    Probe::new("selinux", fields::SELINUX).strategy(Strategy::single(
        command(&["sestatus"]),
        RuleSet::pairs(": ", KeyStyle::Squash).collapse_whitespace(),
    ))
}

fn service_matchers() -> Vec<Matcher> {
    let mut matchers: Vec<Matcher> = SERVICE_SHELLS.iter().map(|s| Matcher::contains(*s)).collect();
    matchers.push(Matcher::field(Some(':'), 0, &RESERVED_ACCOUNTS));
    matchers
}

fn passwd_step(config: &HostinfoConfig) -> Step {
    Step::new(Source::file(&config.paths.passwd), Accept::NonEmpty)
}

/// Human accounts: everything that is not a service account.
pub fn user_rules() -> RuleSet {
    RuleSet::listing(fields::USERS, "; ")
        .drop(service_matchers())
        .collapse_whitespace()
}

fn users(config: &HostinfoConfig) -> Probe {
    Probe::new("users", fields::USERS).strategy(Strategy::single(passwd_step(config), user_rules()))
}

fn monikers(config: &HostinfoConfig) -> Probe {
    Probe::new("monikers", fields::MONIKERS).strategy(Strategy::single(
        passwd_step(config),
        RuleSet::listing(fields::MONIKERS, "; ")
            .drop(service_matchers())
            .collapse_whitespace()
            .replace(&PASSWD_USERNAME, "$1"),
    ))
}

/// Service and reserved accounts only.
pub fn service_account_rules() -> RuleSet {
    RuleSet::listing(fields::SERVICE_ACCOUNTS, "; ")
        .keep(service_matchers())
        .collapse_whitespace()
}

fn service_accounts(config: &HostinfoConfig) -> Probe {
    Probe::new("service_accounts", fields::SERVICE_ACCOUNTS).strategy(Strategy::single(
        passwd_step(config),
        service_account_rules(),
    ))
}

fn sudoers(config: &HostinfoConfig) -> Probe {
    let rules = || {
        RuleSet::listing(fields::SUDOERS, "; ")
            .join_backslash()
            .drop(vec![
                Matcher::pattern(&SUDOERS_INCLUDE),
                Matcher::pattern(&COMMENT_LINE),
                Matcher::pattern(&SUDOERS_DEFAULTS),
            ])
            .collapse_whitespace()
    };

    Probe::new("sudoers", fields::SUDOERS)
        .strategy(Strategy::single(
            Step::new(
                Source::drop_ins(&config.paths.sudoers_dir, &config.paths.sudoers),
                Accept::ExitZero,
            ),
            rules(),
        ))
        .strategy(Strategy::single(
            Step::new(Source::file(&config.paths.sudoers), Accept::ExitZero),
            rules(),
        ))
}

fn root_password(config: &HostinfoConfig) -> Probe {
    Probe::new("root_password", fields::ROOT_PASSWORD)
        .strategy(Strategy::single(
            command(&["chage", "-l", "root"]),
            RuleSet::pairs(": ", KeyStyle::Underscore)
                .keep(vec![Matcher::starts_with("Last password change")])
                .collapse_whitespace(),
        ))
        .assessment(Assessment::RootPasswordAge {
            max_age_days: config.root_password_max_age_days,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use proptest::strategy::Strategy;
    use std::collections::HashSet;

    fn rules_of(probe: &Probe, index: usize) -> &RuleSet {
        &probe.strategies[index].rules
    }

    #[test]
    fn test_declared_order_and_unique_fields() {
        let probes = catalogue(&HostinfoConfig::default());
        let names: Vec<&str> = probes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "os",
                "packages",
                "time",
                "interfaces",
                "primary_ip",
                "addresses",
                "mac",
                "hardware",
                "sockets",
                "selinux",
                "users",
                "monikers",
                "service_accounts",
                "sudoers",
                "root_password"
            ]
        );
        let fields: HashSet<&str> = probes.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields.len(), probes.len());
        assert!(probes.iter().all(|p| !p.strategies.is_empty()));
    }

    #[test]
    fn test_os_release() {
        let raw = "NAME=\"CentOS Linux\"\nVERSION=\"7 (Core)\"\nPRETTY_NAME=\"CentOS Linux 7 (Core)\"\n";
        let probe = os(&HostinfoConfig::default());
        assert_eq!(
            rules_of(&probe, 0).normalize(raw).render(),
            "OS='CentOS Linux 7 (Core)'"
        );
    }

    #[test]
    fn test_timedatectl() {
        let raw = "\
      Local time: Mon 2020-04-06 10:00:00 EDT
  Universal time: Mon 2020-04-06 14:00:00 UTC
        RTC time: Mon 2020-04-06 14:00:00
       Time zone: America/New_York (EDT, -0400)
     NTP enabled: yes
NTP synchronized: yes
 RTC in local TZ: no
      DST active: yes
 Last DST change: DST began at
                  Sun 2020-03-08 01:59:59 EST
";
        let seq = rules_of(&time(), 0).normalize(raw);
        assert_eq!(seq.len(), 8);
        assert_eq!(seq.tokens()[0].to_string(), "Local_time='Mon 2020-04-06 10:00:00 EDT'");
        assert_eq!(
            seq.get("NTP_synchronized").map(|t| t.value()),
            Some("yes")
        );
        assert_eq!(seq.tokens()[7].to_string(), "DST_active='yes'");
    }

    #[test]
    fn test_proc_net_dev() {
        let raw = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:   12345      100    0    0    0     0          0         0    12345      100    0    0    0     0       0          0
  eth0: 9876543     5000    0    0    0     0          0        10  1234567     4000    0    0    0     0       0          0
";
        let probe = interfaces(&HostinfoConfig::default());
        assert_eq!(
            rules_of(&probe, 2).normalize(raw).render(),
            "Interface_Names='lo,eth0'"
        );
    }

    #[test]
    fn test_primary_ip_first_field() {
        let seq = rules_of(&primary_ip(), 0).normalize("10.0.0.5 192.168.122.1 \n");
        assert_eq!(seq.render(), "Primary_IP='10.0.0.5'");
    }

    #[test]
    fn test_ip_addr() {
        let raw = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\\       valid_lft forever
2: eth0    inet6 fe80::1/64 scope link \\       valid_lft forever preferred_lft forever
";
        assert_eq!(
            rules_of(&addresses(), 1).normalize(raw).render(),
            "All_Interface_Address_Info='lo inet 127.0.0.1/8, eth0 inet 10.0.0.5/24, eth0 inet6 fe80::1/64'"
        );
    }

    #[test]
    fn test_library_sources_come_first() {
        let config = HostinfoConfig::default();
        assert_eq!(interfaces(&config).strategies[0].label, "getifaddrs");
        assert_eq!(addresses().strategies[0].label, "getifaddrs addresses");
        assert_eq!(
            rules_of(&addresses(), 0)
                .normalize("lo inet 127.0.0.1/8\neth0 inet 10.0.0.5/24\n")
                .render(),
            "All_Interface_Address_Info='lo inet 127.0.0.1/8, eth0 inet 10.0.0.5/24'"
        );
    }

    #[test]
    fn test_ifconfig_interface_names() {
        let probe = interfaces(&HostinfoConfig::default());
        // Output of the awk pipelines, modern then legacy layout.
        assert_eq!(
            rules_of(&probe, 3).normalize("eth0\nlo\n").render(),
            "Interface_Names='eth0,lo'"
        );
        assert_eq!(
            rules_of(&probe, 4).normalize("eth0  \nlo\n").render(),
            "Interface_Names='eth0,lo'"
        );
    }

    #[test]
    fn test_ifconfig_addresses_both_layouts() {
        let modern = "\
eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>  mtu 1500
        inet 10.0.0.5  netmask 255.255.255.0  broadcast 10.0.0.255
        inet6 fe80::1  prefixlen 64  scopeid 0x20<link>
        ether 00:0c:29:aa:bb:cc  txqueuelen 1000  (Ethernet)
";
        let legacy = "\
eth0      Link encap:Ethernet  HWaddr 00:0C:29:AA:BB:CC
          inet addr:10.0.0.5  Bcast:10.0.0.255  Mask:255.255.255.0
          inet6 addr: fe80::1/64 Scope:Link
";
        let probe = addresses();
        let rules = rules_of(&probe, 2);
        assert_eq!(
            rules.normalize(modern).render(),
            "All_Interface_Address_Info='inet 10.0.0.5, inet6 fe80::1'"
        );
        assert_eq!(
            rules.normalize(legacy).render(),
            "All_Interface_Address_Info='inet 10.0.0.5, inet6 fe80::1/64'"
        );
    }

    #[test]
    fn test_mac_both_layouts() {
        let probe = mac();
        assert_eq!(probe.strategies[0].label, "ifconfig | grep ether | awk '{print $2}'");
        assert_eq!(probe.strategies[1].label, "ifconfig | grep HWaddr | awk '{print $5}'");
        assert_eq!(
            rules_of(&probe, 0)
                .normalize("00:0c:29:aa:bb:cc\n52:54:00:12:34:56\n")
                .render(),
            "MAC_Address(es)='00:0c:29:aa:bb:cc, 52:54:00:12:34:56'"
        );
        assert_eq!(
            rules_of(&probe, 1).normalize("00:0C:29:AA:BB:CC\n").render(),
            "MAC_Address(es)='00:0C:29:AA:BB:CC'"
        );
    }

    #[test]
    fn test_sockets() {
        let raw = "\
Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State       PID/Program name     Timer
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN      1042/sshd            off (0.00/0/0)
netstat: no support for `AF INET (sctp)' on this system.
";
        assert_eq!(
            rules_of(&sockets(), 0).normalize(raw).render(),
            "Active_Sockets='tcp 0 0 0.0.0.0:22 0.0.0.0:* LISTEN 1042/sshd off (0.00/0/0)'"
        );
    }

    #[test]
    fn test_sestatus() {
        let raw = "SELinux status:                 enabled\nCurrent mode:                   enforcing\n";
        assert_eq!(
            rules_of(&selinux(), 0).normalize(raw).render(),
            "SELinuxstatus='enabled'; Currentmode='enforcing'"
        );
    }

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
bin:x:1:1:bin:/bin:/sbin/nologin
sync:x:5:0:sync:/sbin:/bin/sync
shutdown:x:6:0:shutdown:/sbin:/sbin/shutdown
halt:x:7:0:halt:/sbin:/sbin/halt
sshd:x:74:74:Privilege-separated SSH:/var/empty/sshd:/sbin/nologin
alice:x:1000:1000:Alice Admin:/home/alice:/bin/bash
rooted:x:1001:1001::/home/rooted:/bin/zsh
tss:x:59:59:TPM:/dev/null:/bin/false
";

    #[test]
    fn test_account_split() {
        let config = HostinfoConfig::default();
        assert_eq!(
            user_rules().normalize(PASSWD).render(),
            "User_Accounts='alice:x:1000:1000:Alice Admin:/home/alice:/bin/bash; \
             rooted:x:1001:1001::/home/rooted:/bin/zsh'"
        );
        assert_eq!(
            rules_of(&monikers(&config), 0).normalize(PASSWD).render(),
            "Monikers='alice; rooted'"
        );
        let services = service_account_rules().normalize(PASSWD);
        assert!(services.tokens()[0].value().starts_with("root:x:0:0"));
        assert!(services.tokens()[0].value().contains("tss:x:59"));
    }

    #[test]
    fn test_sudoers_noise_removed() {
        let raw = "\
# sudoers file
Defaults    env_reset
Defaults    secure_path = /sbin:/bin:/usr/sbin:/usr/bin
root    ALL=(ALL)       ALL
%wheel  ALL=(ALL)       ALL
Cmnd_Alias NET = /sbin/ip, \\
                 /sbin/ifconfig
#includedir /etc/sudoers.d
";
        let probe = sudoers(&HostinfoConfig::default());
        assert_eq!(
            rules_of(&probe, 0).normalize(raw).render(),
            "Sudoers_Entries='root ALL=(ALL) ALL; %wheel ALL=(ALL) ALL; Cmnd_Alias NET = /sbin/ip, /sbin/ifconfig'"
        );
    }

    #[test]
    fn test_chage_line() {
        let raw = "\
Last password change\t\t\t\t\t: Apr 06, 2020
Password expires\t\t\t\t\t: never
";
        let seq = rules_of(&root_password(&HostinfoConfig::default()), 0).normalize(raw);
        assert_eq!(seq.render(), "Last_password_change='Apr 06, 2020'");
    }

    fn passwd_line() -> impl Strategy<Value = String> {
        (
            prop_oneof![
                Just("root".to_string()),
                Just("sync".to_string()),
                Just("shutdown".to_string()),
                Just("halt".to_string()),
                "[a-z][a-z0-9]{0,8}",
            ],
            prop_oneof![
                Just("/bin/bash".to_string()),
                Just("/sbin/nologin".to_string()),
                Just("/bin/false".to_string()),
                Just("/bin/zsh".to_string()),
            ],
        )
            .prop_map(|(name, shell)| format!("{}:x:1000:1000::/home/{}:{}", name, name, shell))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_user_accounts_exclude_denylist(lines in proptest::collection::vec(passwd_line(), 1..30)) {
            let raw = lines.join("\n");
            let is_service = |line: &str| {
                let name = line.split(':').next().unwrap_or("");
                RESERVED_ACCOUNTS.contains(&name)
                    || SERVICE_SHELLS.iter().any(|s| line.contains(s))
            };

            let expected_users: Vec<&str> =
                lines.iter().map(String::as_str).filter(|l| !is_service(*l)).collect();
            let expected_services: Vec<&str> =
                lines.iter().map(String::as_str).filter(|l| is_service(*l)).collect();

            let users = user_rules().normalize(&raw);
            let services = service_account_rules().normalize(&raw);

            prop_assert_eq!(users.tokens()[0].value(), expected_users.join("; "));
            prop_assert_eq!(services.tokens()[0].value(), expected_services.join("; "));
        }
    }
}
