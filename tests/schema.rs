use yangtree::context::{
    Context, ContextFlags, EmbeddedModuleKey, EmbeddedModules,
};
use yangtree::schema::{
    DataValueType, SchemaInputFormat, SchemaNodeKind, SchemaOutputFormat,
    SchemaPathFormat, SchemaPrinterFlags,
};
use yangtree::ErrorCode;

mod common;

use common::{create_context, embedded_modules};

#[test]
fn module_metadata() {
    let ctx = create_context();
    let module = ctx.get_module_latest("network").unwrap();

    assert_eq!(module.name(), "network");
    assert_eq!(module.namespace(), "urn:example:network");
    assert_eq!(module.prefix(), "net");
    assert_eq!(module.revision(), Some("2024-03-01"));
    assert_eq!(
        module.revisions().collect::<Vec<_>>(),
        vec!["2024-03-01", "2024-01-20"]
    );
    assert!(module.is_implemented());

    let imported = ctx.get_module_latest("network-types").unwrap();
    assert_eq!(imported.revision(), Some("2024-01-15"));
    assert_eq!(
        ctx.get_module_latest_ns("urn:example:network-types")
            .unwrap()
            .name(),
        "network-types"
    );
}

#[test]
fn schema_find_path() {
    let ctx = create_context();

    let snode = ctx
        .find_path("/network:interfaces/interface/mtu")
        .expect("Failed to lookup schema node");
    assert_eq!(snode.name(), "mtu");
    assert_eq!(snode.kind(), SchemaNodeKind::Leaf);
    assert!(snode.is_config());
    assert_eq!(
        snode.path(SchemaPathFormat::DATA),
        "/network:interfaces/interface/mtu"
    );

    // Nodes instantiated from a grouping are found transparently.
    let snode = ctx
        .find_path("/network:interfaces/interface/in-octets")
        .expect("Failed to lookup grouping-instantiated node");
    assert_eq!(snode.kind(), SchemaNodeKind::Leaf);
    assert_eq!(snode.module().name(), "network");

    // Augmented nodes keep their module of origin.
    let snode = ctx
        .find_path("/network:interfaces/interface/network-ext:description")
        .expect("Failed to lookup augmented node");
    assert_eq!(snode.module().name(), "network-ext");

    assert!(ctx.find_path("/network:interfaces/no-such-node").is_err());
}

#[test]
fn schema_node_attributes() {
    let ctx = create_context();

    let snode = ctx
        .find_path("/network:interfaces/interface/type")
        .unwrap();
    assert!(snode.is_mandatory());
    assert_eq!(
        snode.leaf_type().unwrap().base_type(),
        DataValueType::IdentityRef
    );

    let snode = ctx
        .find_path("/network:interfaces/interface/enabled")
        .unwrap();
    assert!(!snode.is_mandatory());
    assert!(snode.has_default());
    assert_eq!(snode.default_value_canonical(), Some("true"));
    assert_eq!(
        snode.leaf_type().unwrap().base_type(),
        DataValueType::Bool
    );

    let snode = ctx
        .find_path("/network:interfaces/interface/bandwidth")
        .unwrap();
    assert_eq!(snode.units(), Some("Mb/s"));
    assert_eq!(
        snode.leaf_type().unwrap().typedef_name(),
        Some("bandwidth".to_string())
    );

    let snode = ctx
        .find_path("/network:interfaces/interface/utilization")
        .unwrap();
    assert!(snode.is_state());

    let snode = ctx
        .find_path("/network:interfaces/interface/tunnel")
        .unwrap();
    assert!(!snode.is_np_container());
    assert_eq!(snode.presence(), Some("Tunnel parameters"));
}

#[test]
fn schema_list_properties() {
    let ctx = create_context();
    let snode = ctx.find_path("/network:interfaces/interface").unwrap();

    assert_eq!(snode.kind(), SchemaNodeKind::List);
    assert!(!snode.is_keyless_list());
    assert_eq!(
        snode
            .list_keys()
            .map(|key| key.name().to_string())
            .collect::<Vec<_>>(),
        vec!["name"]
    );
    assert_eq!(snode.list_uniques().collect::<Vec<_>>(), vec!["address"]);

    let key = ctx
        .find_path("/network:interfaces/interface/name")
        .unwrap();
    assert!(key.is_list_key());
    assert!(key.is_mandatory());

    let leaflist = ctx
        .find_path("/network:interfaces/interface/search-domain")
        .unwrap();
    assert_eq!(leaflist.kind(), SchemaNodeKind::LeafList);
    assert!(leaflist.is_user_ordered());
}

#[test]
fn schema_leafref() {
    let ctx = create_context();
    let snode = ctx
        .find_path("/network:routing/default-interface")
        .unwrap();

    let ltype = snode.leaf_type().unwrap();
    assert_eq!(ltype.base_type(), DataValueType::LeafRef);
    let real = ltype.leafref_real_type().unwrap();
    assert_eq!(real.base_type(), DataValueType::String);
    assert_eq!(real.typedef_name(), Some("if-name".to_string()));
}

#[test]
fn schema_union() {
    let ctx = create_context();
    let snode = ctx.find_path("/network:routing/backup-port").unwrap();

    let ltype = snode.leaf_type().unwrap();
    assert_eq!(ltype.base_type(), DataValueType::Union);
    assert_eq!(
        ltype
            .union_types()
            .map(|member| member.base_type())
            .collect::<Vec<_>>(),
        vec![DataValueType::Uint16, DataValueType::String]
    );
}

#[test]
fn schema_iterators() {
    let ctx = create_context();
    let module = ctx.get_module_latest("network").unwrap();

    assert_eq!(
        module
            .data()
            .map(|snode| snode.name().to_string())
            .collect::<Vec<_>>(),
        vec!["interfaces", "routing"]
    );
    assert_eq!(
        module
            .rpcs()
            .map(|snode| snode.name().to_string())
            .collect::<Vec<_>>(),
        vec!["restart-interface"]
    );
    assert_eq!(
        module
            .notifications()
            .map(|snode| snode.name().to_string())
            .collect::<Vec<_>>(),
        vec!["link-down"]
    );

    let interfaces = ctx.find_path("/network:interfaces").unwrap();
    let interface = ctx.find_path("/network:interfaces/interface").unwrap();
    assert_eq!(interface.ancestors().count(), 1);
    assert_eq!(
        interface.ancestors().next().unwrap().name(),
        "interfaces"
    );
    assert!(interfaces.traverse().count() > 10);
}

#[test]
fn schema_features() {
    let mut ctx = create_context();

    let module = ctx.get_module_latest("network").unwrap();
    assert_eq!(module.feature_value("tunneling"), Ok(false));
    assert_eq!(module.feature_value("advanced-tunneling"), Ok(false));
    assert!(module.feature_value("no-such-feature").is_err());

    let tunnel = ctx
        .find_path("/network:interfaces/interface/tunnel")
        .unwrap();
    assert!(!tunnel.is_enabled());

    // A feature whose if-feature dependencies are disabled stays
    // disabled even when explicitly enabled.
    ctx.feature_enable("network", "advanced-tunneling").unwrap();
    let module = ctx.get_module_latest("network").unwrap();
    assert_eq!(module.feature_value("advanced-tunneling"), Ok(false));

    ctx.feature_enable("network", "tunneling").unwrap();
    let module = ctx.get_module_latest("network").unwrap();
    assert_eq!(module.feature_value("tunneling"), Ok(true));
    assert_eq!(module.feature_value("advanced-tunneling"), Ok(true));
    let tunnel = ctx
        .find_path("/network:interfaces/interface/tunnel")
        .unwrap();
    assert!(tunnel.is_enabled());

    ctx.feature_disable("network", "*").unwrap();
    let module = ctx.get_module_latest("network").unwrap();
    assert_eq!(module.feature_value("tunneling"), Ok(false));
}

#[test]
fn schema_load_module_features() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();
    ctx.set_embedded_modules(&embedded_modules());

    let module = ctx.load_module("network", None, &["tunneling"]).unwrap();
    assert_eq!(module.feature_value("tunneling"), Ok(true));
}

#[test]
fn schema_circular_import() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();

    let mut modules = EmbeddedModules::new();
    modules.insert(
        EmbeddedModuleKey::new("mod-a", None, None, None),
        r###"module mod-a {
            namespace "urn:example:a";
            prefix a;
            import mod-b {
                prefix b;
            }
        }"###,
    );
    modules.insert(
        EmbeddedModuleKey::new("mod-b", Some("2015-01-01"), None, None),
        r###"module mod-b {
            namespace "urn:example:b";
            prefix b;
            import mod-a {
                prefix a;
            }
            revision 2015-01-01;
        }"###,
    );
    ctx.set_embedded_modules(&modules);

    let err = ctx.load_module("mod-a", None, &[]).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Circular);
}

#[test]
fn schema_duplicate_node_name() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();

    let err = ctx
        .parse_module_str(
            r###"module dup {
                namespace "urn:example:dup";
                prefix d;
                leaf x { type string; }
                leaf x { type uint8; }
            }"###,
            SchemaInputFormat::YANG,
        )
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::DupName);

    // The failed module was unwound from the context.
    assert!(ctx.get_module_latest("dup").is_none());
}

#[test]
fn schema_repeated_statement() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();

    let err = ctx
        .parse_module_str(
            r###"module rep {
                namespace "urn:example:rep";
                prefix r;
                leaf x {
                    type string;
                    description "one";
                    description "two";
                }
            }"###,
            SchemaInputFormat::YANG,
        )
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::TooMany);
}

#[test]
fn schema_invalid_derived_range() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();

    // A derived range disjoint from its base range cannot resolve.
    let err = ctx
        .parse_module_str(
            r###"module bad-range {
                namespace "urn:example:bad-range";
                prefix br;
                typedef small {
                    type uint8 {
                        range "0..10";
                    }
                }
                leaf x {
                    type small {
                        range "20..30";
                    }
                }
            }"###,
            SchemaInputFormat::YANG,
        )
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Inval);
}

#[test]
fn schema_identity_cycle() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();

    let err = ctx
        .parse_module_str(
            r###"module idcycle {
                namespace "urn:example:idcycle";
                prefix ic;
                identity a { base b; }
                identity b { base a; }
            }"###,
            SchemaInputFormat::YANG,
        )
        .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Circular);
}

#[test]
fn schema_yin_and_yang_equivalence() {
    let _ = env_logger::builder().is_test(true).try_init();

    static YANG_SRC: &str = r###"module tiny {
        namespace "urn:example:tiny";
        prefix t;
        leaf host {
            type string {
                length "1..253";
            }
            description "Host name.";
        }
    }"###;
    static YIN_SRC: &str = r###"<?xml version="1.0" encoding="UTF-8"?>
<module name="tiny"
        xmlns="urn:ietf:params:xml:ns:yang:yin:1"
        xmlns:t="urn:example:tiny">
  <namespace uri="urn:example:tiny"/>
  <prefix value="t"/>
  <leaf name="host">
    <type name="string">
      <length value="1..253"/>
    </type>
    <description>
      <text>Host name.</text>
    </description>
  </leaf>
</module>"###;

    let mut ctx_yang = Context::new(ContextFlags::empty()).unwrap();
    ctx_yang
        .parse_module_str(YANG_SRC, SchemaInputFormat::YANG)
        .expect("Failed to parse YANG module");
    let mut ctx_yin = Context::new(ContextFlags::empty()).unwrap();
    ctx_yin
        .parse_module_str(YIN_SRC, SchemaInputFormat::YIN)
        .expect("Failed to parse YIN module");

    // Both front-ends must produce identical schema models.
    let print_yang = ctx_yang
        .get_module_latest("tiny")
        .unwrap()
        .print_string(SchemaOutputFormat::YIN, SchemaPrinterFlags::empty())
        .unwrap();
    let print_yin = ctx_yin
        .get_module_latest("tiny")
        .unwrap()
        .print_string(SchemaOutputFormat::YIN, SchemaPrinterFlags::empty())
        .unwrap();
    assert_eq!(print_yang, print_yin);
}

#[test]
fn schema_yin_round_trip() {
    let ctx = create_context();
    let printed = ctx
        .get_module_latest("network")
        .unwrap()
        .print_string(SchemaOutputFormat::YIN, SchemaPrinterFlags::empty())
        .expect("Failed to print module");

    // Reparse the printed YIN and print again: the output must reach a
    // fixed point.
    let mut ctx2 = Context::new(ContextFlags::empty()).unwrap();
    ctx2.set_embedded_modules(&embedded_modules());
    ctx2.load_module("network-types", None, &[]).unwrap();
    ctx2.parse_module_str(&printed, SchemaInputFormat::YIN)
        .expect("Failed to reparse printed module");
    let reprinted = ctx2
        .get_module_latest("network")
        .unwrap()
        .print_string(SchemaOutputFormat::YIN, SchemaPrinterFlags::empty())
        .unwrap();
    assert_eq!(printed, reprinted);
}

#[test]
fn schema_submodule() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();

    let mut modules = EmbeddedModules::new();
    modules.insert(
        EmbeddedModuleKey::new("main-mod", None, None, None),
        r###"module main-mod {
            namespace "urn:example:main";
            prefix m;
            include main-sub;
            leaf top { type string; }
        }"###,
    );
    modules.insert(
        EmbeddedModuleKey::new("main-mod", None, Some("main-sub"), None),
        r###"submodule main-sub {
            belongs-to main-mod {
                prefix m;
            }
            leaf from-sub { type uint32; }
        }"###,
    );
    ctx.set_embedded_modules(&modules);

    let module = ctx.load_module("main-mod", None, &[]).unwrap();
    assert_eq!(
        module.submodule_names().collect::<Vec<_>>(),
        vec!["main-sub"]
    );
    assert_eq!(
        module
            .data()
            .map(|snode| snode.name().to_string())
            .collect::<Vec<_>>(),
        vec!["from-sub", "top"]
    );
}
