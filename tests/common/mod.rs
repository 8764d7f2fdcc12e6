//! Shared test fixtures: embedded YANG modules and context setup.

use yangtree::context::{
    Context, ContextFlags, EmbeddedModuleKey, EmbeddedModules,
};

pub static NETWORK_TYPES: &str = r###"
module network-types {
  namespace "urn:example:network-types";
  prefix nt;

  revision 2024-01-15 {
    description "Initial revision.";
  }

  identity interface-type {
    description "Base type of an interface.";
  }
  identity ethernet {
    base interface-type;
  }
  identity fast-ethernet {
    base ethernet;
  }
  identity tunnel {
    base interface-type;
  }

  typedef percent {
    type uint8 {
      range "0..100";
    }
    units "percent";
  }

  typedef split-range {
    type uint8 {
      range "0..10|20..30";
    }
  }

  typedef if-name {
    type string {
      length "1..63";
      pattern "[A-Za-z][A-Za-z0-9/.-]*";
    }
  }

  typedef bandwidth {
    type decimal64 {
      fraction-digits 2;
      range "0..100000.0";
    }
    units "Mb/s";
  }

  grouping counters {
    leaf in-octets {
      type uint64;
    }
    leaf out-octets {
      type uint64;
    }
  }
}
"###;

pub static NETWORK: &str = r###"
module network {
  namespace "urn:example:network";
  prefix net;

  import network-types {
    prefix nt;
    revision-date 2024-01-15;
  }

  revision 2024-03-01 {
    description "Add tunneling.";
  }
  revision 2024-01-20 {
    description "Initial revision.";
  }

  feature tunneling {
    description "Tunnel interfaces supported.";
  }
  feature advanced-tunneling {
    if-feature tunneling;
  }

  container interfaces {
    list interface {
      key "name";
      unique "address";
      leaf name {
        type nt:if-name;
      }
      leaf type {
        type identityref {
          base nt:interface-type;
        }
        mandatory true;
      }
      leaf enabled {
        type boolean;
        default "true";
      }
      leaf mtu {
        type uint16 {
          range "68..9216";
        }
      }
      leaf address {
        type string;
      }
      leaf bandwidth {
        type nt:bandwidth;
      }
      leaf priority {
        type nt:split-range;
      }
      leaf utilization {
        type nt:percent;
        config false;
      }
      leaf-list search-domain {
        type string;
        ordered-by user;
      }
      leaf flags {
        type bits {
          bit up;
          bit broadcast {
            position 2;
          }
          bit multicast;
        }
      }
      choice transport {
        case ipv4 {
          leaf ipv4-address {
            type string;
          }
        }
        case ipv6 {
          leaf ipv6-address {
            type string;
          }
        }
      }
      container tunnel {
        if-feature tunneling;
        presence "Tunnel parameters";
        leaf remote {
          type string;
          mandatory true;
        }
      }
      uses nt:counters;
    }
  }

  container routing {
    leaf default-interface {
      type leafref {
        path "../../interfaces/interface/name";
      }
    }
    leaf backup-port {
      type union {
        type uint16;
        type string;
      }
    }
    leaf hops {
      type int8;
    }
    leaf enable-trap {
      type empty;
    }
    leaf monitor {
      type instance-identifier;
    }
  }

  rpc restart-interface {
    input {
      leaf name {
        type nt:if-name;
      }
    }
    output {
      leaf status {
        type string;
      }
    }
  }

  notification link-down {
    leaf name {
      type nt:if-name;
    }
  }
}
"###;

pub static NETWORK_EXT: &str = r###"
module network-ext {
  namespace "urn:example:network-ext";
  prefix ne;

  import network {
    prefix net;
  }

  augment "/net:interfaces/net:interface" {
    leaf description {
      type string;
    }
  }
}
"###;

pub fn embedded_modules() -> EmbeddedModules {
    let mut modules = EmbeddedModules::new();
    modules.insert(
        EmbeddedModuleKey::new(
            "network-types",
            Some("2024-01-15"),
            None,
            None,
        ),
        NETWORK_TYPES,
    );
    modules.insert(
        EmbeddedModuleKey::new("network", Some("2024-03-01"), None, None),
        NETWORK,
    );
    modules.insert(
        EmbeddedModuleKey::new("network-ext", None, None, None),
        NETWORK_EXT,
    );
    modules
}

pub fn create_context() -> Context {
    let _ = env_logger::builder().is_test(true).try_init();

    // Initialize context.
    let mut ctx = Context::new(ContextFlags::empty())
        .expect("Failed to create context");
    ctx.set_embedded_modules(&embedded_modules());

    // Load YANG modules.
    for module_name in &["network", "network-ext"] {
        ctx.load_module(module_name, None, &[])
            .expect("Failed to load module");
    }

    ctx
}
