use yangtree::context::{Context, ContextFlags};
use yangtree::data::{
    Data, DataFormat, DataParserFlags, DataPrinterFlags, DataTree,
    DataValidationFlags,
};
use yangtree::schema::DataValue;
use yangtree::ErrorCode;

mod common;

use common::create_context;

static VALID_XML: &str = r###"
<interfaces xmlns="urn:example:network"
            xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <mtu>1500</mtu>
    <address>192.0.2.1</address>
    <bandwidth>1000</bandwidth>
    <flags>multicast up</flags>
    <ipv4-address>192.0.2.1</ipv4-address>
    <in-octets>184467</in-octets>
  </interface>
  <interface>
    <name>eth1</name>
    <type>ift:fast-ethernet</type>
    <enabled>false</enabled>
    <address>192.0.2.2</address>
  </interface>
</interfaces>
<routing xmlns="urn:example:network">
  <default-interface>eth0</default-interface>
  <backup-port>8080</backup-port>
  <hops>15</hops>
  <enable-trap/>
</routing>
"###;

fn parse<'a>(
    ctx: &'a Context,
    xml: &str,
    options: DataParserFlags,
) -> yangtree::Result<DataTree<'a>> {
    DataTree::parse_string(
        ctx,
        xml,
        DataFormat::XML,
        options,
        DataValidationFlags::empty(),
    )
}

fn parse_routing_leaf<'a>(
    ctx: &'a Context,
    leaf: &str,
    value: &str,
) -> yangtree::Result<DataTree<'a>> {
    let xml = format!(
        "<routing xmlns=\"urn:example:network\"><{}>{}</{}></routing>",
        leaf, value, leaf
    );
    parse(ctx, &xml, DataParserFlags::empty())
}

#[test]
fn data_parse_valid() {
    let ctx = create_context();
    let dtree =
        parse(&ctx, VALID_XML, DataParserFlags::empty()).expect("parse");

    let dnode = dtree
        .find_path("/network:interfaces/interface[name='eth0']/mtu")
        .unwrap();
    assert_eq!(dnode.value_canonical().as_deref(), Some("1500"));
    assert_eq!(dnode.value(), Some(DataValue::Uint16(1500)));

    let dnode = dtree
        .find_path("/network:interfaces/interface[name='eth0']/type")
        .unwrap();
    assert_eq!(
        dnode.value_canonical().as_deref(),
        Some("network-types:ethernet")
    );

    // Bits canonical order follows positions.
    let dnode = dtree
        .find_path("/network:interfaces/interface[name='eth0']/flags")
        .unwrap();
    assert_eq!(dnode.value_canonical().as_deref(), Some("up multicast"));

    // Decimal64 canonical form.
    let dnode = dtree
        .find_path("/network:interfaces/interface[name='eth0']/bandwidth")
        .unwrap();
    assert_eq!(dnode.value_canonical().as_deref(), Some("1000.0"));

    // The first matching union member decides the typed value.
    let dnode = dtree.find_path("/network:routing/backup-port").unwrap();
    assert_eq!(dnode.value(), Some(DataValue::Uint16(8080)));

    let dnode = dtree
        .find_path("/network:interfaces/interface[name='eth1']/enabled")
        .unwrap();
    assert_eq!(dnode.value(), Some(DataValue::Bool(false)));

    let dnode = dtree
        .find_path("/network:interfaces/interface[name='eth0']/in-octets")
        .unwrap();
    assert_eq!(dnode.value(), Some(DataValue::Uint64(184467)));

    assert_eq!(
        dnode.path(),
        "/network:interfaces/interface[name='eth0']/in-octets"
    );
}

#[test]
fn data_union_member_order() {
    let ctx = create_context();

    let dtree = parse_routing_leaf(&ctx, "backup-port", "both").unwrap();
    let dnode = dtree.find_path("/network:routing/backup-port").unwrap();
    assert_eq!(dnode.value(), Some(DataValue::Other("both".to_string())));

    // "123" matches both members; uint16 is listed first and wins.
    let dtree = parse_routing_leaf(&ctx, "backup-port", "123").unwrap();
    let dnode = dtree.find_path("/network:routing/backup-port").unwrap();
    assert_eq!(dnode.value(), Some(DataValue::Uint16(123)));
}

#[test]
fn data_integer_boundaries() {
    let ctx = create_context();

    assert!(parse_routing_leaf(&ctx, "hops", "-128").is_ok());
    assert!(parse_routing_leaf(&ctx, "hops", "127").is_ok());
    assert_eq!(
        parse_routing_leaf(&ctx, "hops", "-129").unwrap_err().errcode,
        ErrorCode::Oorval
    );
    assert_eq!(
        parse_routing_leaf(&ctx, "hops", "128").unwrap_err().errcode,
        ErrorCode::Oorval
    );
    assert_eq!(
        parse_routing_leaf(&ctx, "hops", "abc").unwrap_err().errcode,
        ErrorCode::Inval
    );
}

fn parse_interface_leaf<'a>(
    ctx: &'a Context,
    leaf: &str,
    value: &str,
) -> yangtree::Result<DataTree<'a>> {
    let xml = format!(
        r###"<interfaces xmlns="urn:example:network"
            xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <{}>{}</{}>
  </interface>
</interfaces>"###,
        leaf, value, leaf
    );
    parse(ctx, &xml, DataParserFlags::empty())
}

#[test]
fn data_split_range() {
    let ctx = create_context();

    assert!(parse_interface_leaf(&ctx, "priority", "5").is_ok());
    assert!(parse_interface_leaf(&ctx, "priority", "25").is_ok());
    assert_eq!(
        parse_interface_leaf(&ctx, "priority", "15")
            .unwrap_err()
            .errcode,
        ErrorCode::Oorval
    );
    assert_eq!(
        parse_interface_leaf(&ctx, "priority", "31")
            .unwrap_err()
            .errcode,
        ErrorCode::Oorval
    );
}

#[test]
fn data_restriction_boundaries() {
    let ctx = create_context();

    assert!(parse_interface_leaf(&ctx, "mtu", "68").is_ok());
    assert!(parse_interface_leaf(&ctx, "mtu", "9216").is_ok());
    assert_eq!(
        parse_interface_leaf(&ctx, "mtu", "67").unwrap_err().errcode,
        ErrorCode::Oorval
    );
    assert_eq!(
        parse_interface_leaf(&ctx, "mtu", "9217").unwrap_err().errcode,
        ErrorCode::Oorval
    );

    // decimal64 with two fraction digits.
    assert!(parse_interface_leaf(&ctx, "bandwidth", "100000.00").is_ok());
    assert_eq!(
        parse_interface_leaf(&ctx, "bandwidth", "100000.01")
            .unwrap_err()
            .errcode,
        ErrorCode::Oorval
    );
    assert_eq!(
        parse_interface_leaf(&ctx, "bandwidth", "0.001")
            .unwrap_err()
            .errcode,
        ErrorCode::Oorval
    );

    // empty type.
    assert_eq!(
        parse_routing_leaf(&ctx, "enable-trap", "x")
            .unwrap_err()
            .errcode,
        ErrorCode::Inval
    );

    // boolean is exactly "true" or "false".
    assert_eq!(
        parse_interface_leaf(&ctx, "enabled", "yes")
            .unwrap_err()
            .errcode,
        ErrorCode::Inval
    );
}

#[test]
fn data_string_pattern() {
    let ctx = create_context();

    // The pattern must match the complete value, not a prefix.
    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0 bad</name>
    <type>ift:ethernet</type>
  </interface>
</interfaces>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Inval);
}

#[test]
fn data_duplicate_list_instance() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
  </interface>
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
  </interface>
</interfaces>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::DupList);
}

#[test]
fn data_duplicate_leaflist_value() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <search-domain>example.net</search-domain>
    <search-domain>example.net</search-domain>
  </interface>
</interfaces>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::DupLeaflist);
}

#[test]
fn data_unique_violation() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <address>192.0.2.1</address>
  </interface>
  <interface>
    <name>eth1</name>
    <type>ift:ethernet</type>
    <address>192.0.2.1</address>
  </interface>
</interfaces>"###;
    assert!(parse(&ctx, xml, DataParserFlags::empty()).is_err());
}

#[test]
fn data_multiple_cases() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <ipv4-address>192.0.2.1</ipv4-address>
    <ipv6-address>2001:db8::1</ipv6-address>
  </interface>
</interfaces>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::McaseData);
}

#[test]
fn data_missing_key_and_mandatory() {
    let ctx = create_context();

    // Missing list key.
    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <type>ift:ethernet</type>
  </interface>
</interfaces>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Misselem);

    // Missing mandatory leaf.
    let xml = r###"<interfaces xmlns="urn:example:network">
  <interface>
    <name>eth0</name>
  </interface>
</interfaces>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Misselem);
}

#[test]
fn data_unknown_elements() {
    let ctx = create_context();

    // Unknown element in a known namespace is always an error.
    let xml = r###"<interfaces xmlns="urn:example:network">
  <bogus>1</bogus>
</interfaces>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Inelem);

    // An unknown namespace is skipped by default and rejected in
    // strict mode.
    let xml = r###"<foreign xmlns="urn:example:unknown"><x/></foreign>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::empty()).unwrap();
    assert_eq!(dtree.traverse().count(), 0);
    let err = parse(&ctx, xml, DataParserFlags::STRICT).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Inelem);
}

#[test]
fn data_feature_gated_element() {
    let mut ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:tunnel</type>
    <tunnel>
      <remote>peer.example.net</remote>
    </tunnel>
  </interface>
</interfaces>"###;

    // Disabled feature: the element does not match the schema.
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Inelem);

    // After enabling the feature, the same input parses.
    ctx.feature_enable("network", "tunneling").unwrap();
    let dtree = parse(&ctx, xml, DataParserFlags::empty()).unwrap();
    assert!(dtree
        .find_path(
            "/network:interfaces/interface[name='eth0']/tunnel/remote"
        )
        .is_ok());
}

#[test]
fn data_user_ordered_insert() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types"
        xmlns:yang="urn:ietf:params:xml:ns:yang:1">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <search-domain>x</search-domain>
    <search-domain>y</search-domain>
    <search-domain>z</search-domain>
    <search-domain yang:insert="after" yang:value="y">w</search-domain>
  </interface>
</interfaces>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::empty()).unwrap();
    let interface = dtree
        .find_path("/network:interfaces/interface[name='eth0']")
        .unwrap();
    let domains: Vec<String> = interface
        .children()
        .filter(|dnode| dnode.schema().name() == "search-domain")
        .map(|dnode| dnode.value_canonical().unwrap())
        .collect();
    assert_eq!(domains, vec!["x", "y", "w", "z"]);

    // insert="first" moves to the front of the instance group.
    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types"
        xmlns:yang="urn:ietf:params:xml:ns:yang:1">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <search-domain>x</search-domain>
    <search-domain yang:insert="first">w</search-domain>
  </interface>
</interfaces>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::empty()).unwrap();
    let interface = dtree
        .find_path("/network:interfaces/interface[name='eth0']")
        .unwrap();
    let domains: Vec<String> = interface
        .children()
        .filter(|dnode| dnode.schema().name() == "search-domain")
        .map(|dnode| dnode.value_canonical().unwrap())
        .collect();
    assert_eq!(domains, vec!["w", "x"]);

    // before/after without the anchor attribute.
    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types"
        xmlns:yang="urn:ietf:params:xml:ns:yang:1">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <search-domain yang:insert="before">q</search-domain>
  </interface>
</interfaces>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Missattr);
}

#[test]
fn data_leafref_resolution() {
    let ctx = create_context();

    // A leafref whose target instance exists.
    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
  </interface>
</interfaces>
<routing xmlns="urn:example:network">
  <default-interface>eth0</default-interface>
</routing>"###;
    assert!(parse(&ctx, xml, DataParserFlags::empty()).is_ok());

    // No such target instance.
    let xml = r###"<routing xmlns="urn:example:network">
  <default-interface>missing</default-interface>
</routing>"###;
    let err = parse(&ctx, xml, DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::LeafrefTarget);
}

#[test]
fn data_instance_identifier() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
  </interface>
</interfaces>
<routing xmlns="urn:example:network" xmlns:net="urn:example:network">
  <monitor>/net:interfaces/net:interface[net:name='eth0']</monitor>
</routing>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::empty()).unwrap();
    let dnode = dtree.find_path("/network:routing/monitor").unwrap();
    assert_eq!(
        dnode.value_canonical().as_deref(),
        Some("/network:interfaces/interface[name='eth0']")
    );

    let xml = r###"<routing xmlns="urn:example:network"
        xmlns:net="urn:example:network">
  <monitor>/net:interfaces/net:interface[net:name='missing']</monitor>
</routing>"###;
    assert!(parse(&ctx, xml, DataParserFlags::empty()).is_err());
}

#[test]
fn data_edit_config() {
    let ctx = create_context();

    // State data is rejected in edit-config mode.
    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <utilization>50</utilization>
  </interface>
</interfaces>"###;
    assert!(parse(&ctx, xml, DataParserFlags::EDIT).is_err());
    assert!(parse(&ctx, xml, DataParserFlags::empty()).is_ok());

    // Partial trees are accepted (no mandatory enforcement) and
    // leafrefs stay unresolved.
    let xml = r###"<interfaces xmlns="urn:example:network">
  <interface>
    <name>eth0</name>
  </interface>
</interfaces>
<routing xmlns="urn:example:network">
  <default-interface>somewhere-else</default-interface>
</routing>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::EDIT).unwrap();
    let dnode = dtree
        .find_path("/network:routing/default-interface")
        .unwrap();
    assert!(dnode.is_unresolved());
}

#[test]
fn data_filter_merging() {
    let ctx = create_context();

    // Two filter fragments over the same container merge; equal
    // leaf-list selections deduplicate.
    let xml = r###"<interfaces xmlns="urn:example:network">
  <interface>
    <name>eth0</name>
    <search-domain>a</search-domain>
  </interface>
</interfaces>
<interfaces xmlns="urn:example:network">
  <interface>
    <name>eth1</name>
  </interface>
  <interface>
    <name>eth0</name>
    <search-domain>a</search-domain>
    <search-domain>b</search-domain>
  </interface>
</interfaces>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::FILTER).unwrap();

    // A single merged container with both list entries.
    let containers = dtree
        .traverse()
        .filter(|dnode| dnode.schema().name() == "interfaces")
        .count();
    assert_eq!(containers, 1);

    let names: Vec<String> = dtree
        .traverse()
        .filter(|dnode| dnode.schema().name() == "name")
        .map(|dnode| dnode.value_canonical().unwrap())
        .collect();
    assert_eq!(names, vec!["eth0", "eth1"]);

    let domains: Vec<String> = dtree
        .traverse()
        .filter(|dnode| dnode.schema().name() == "search-domain")
        .map(|dnode| dnode.value_canonical().unwrap())
        .collect();
    assert_eq!(domains, vec!["a", "b"]);
}

#[test]
fn data_print_round_trip() {
    let ctx = create_context();
    let dtree =
        parse(&ctx, VALID_XML, DataParserFlags::empty()).expect("parse");

    let printed = dtree
        .print_string(DataFormat::XML, DataPrinterFlags::WITH_SIBLINGS)
        .expect("print");
    let reparsed =
        parse(&ctx, &printed, DataParserFlags::empty()).expect("reparse");
    let reprinted = reparsed
        .print_string(DataFormat::XML, DataPrinterFlags::WITH_SIBLINGS)
        .expect("reprint");
    assert_eq!(printed, reprinted);

    // Same canonical values node by node.
    let before: Vec<(String, Option<String>)> = dtree
        .traverse()
        .map(|dnode| (dnode.path(), dnode.value_canonical()))
        .collect();
    let after: Vec<(String, Option<String>)> = reparsed
        .traverse()
        .map(|dnode| (dnode.path(), dnode.value_canonical()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn data_validate_idempotence() {
    let ctx = create_context();
    let mut dtree =
        parse(&ctx, VALID_XML, DataParserFlags::empty()).expect("parse");

    // Validating a freshly parsed tree is a no-op, and validation is
    // idempotent.
    dtree.validate(DataValidationFlags::empty()).expect("validate");
    dtree.validate(DataValidationFlags::empty()).expect("revalidate");
}

#[test]
fn data_no_state_validation() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <utilization>50</utilization>
  </interface>
</interfaces>"###;
    let err = DataTree::parse_string(
        &ctx,
        xml,
        DataFormat::XML,
        DataParserFlags::empty(),
        DataValidationFlags::NO_STATE,
    )
    .unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Inval);
}

#[test]
fn data_top_level_mandatory() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();
    ctx.parse_module_str(
        r###"module inventory {
            namespace "urn:example:inventory";
            prefix inv;
            leaf serial {
                type string;
                mandatory true;
            }
        }"###,
        yangtree::schema::SchemaInputFormat::YANG,
    )
    .unwrap();

    // A document with no instance of the mandatory top-level leaf is
    // rejected, including a completely empty one.
    let err = parse(&ctx, "", DataParserFlags::empty()).unwrap_err();
    assert_eq!(err.errcode, ErrorCode::Misselem);

    let dtree = parse(
        &ctx,
        r###"<serial xmlns="urn:example:inventory">SN-100</serial>"###,
        DataParserFlags::empty(),
    )
    .unwrap();
    assert_eq!(
        dtree
            .find_path("/inventory:serial")
            .unwrap()
            .value_canonical()
            .as_deref(),
        Some("SN-100")
    );

    // Edit-config payloads are partial by definition and stay exempt.
    assert!(parse(&ctx, "", DataParserFlags::EDIT).is_ok());
}

#[test]
fn data_augmented_nodes() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types">
  <interface>
    <name>eth0</name>
    <type>ift:ethernet</type>
    <description xmlns="urn:example:network-ext">uplink</description>
  </interface>
</interfaces>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::empty()).unwrap();
    let dnode = dtree
        .find_path(
            "/network:interfaces/interface[name='eth0']/network-ext:description",
        )
        .unwrap();
    assert_eq!(dnode.value_canonical().as_deref(), Some("uplink"));
    assert_eq!(dnode.schema().module().name(), "network-ext");

    // The augmented node round-trips with its own namespace.
    let printed = dtree
        .print_string(DataFormat::XML, DataPrinterFlags::WITH_SIBLINGS)
        .unwrap();
    assert!(printed.contains("urn:example:network-ext"));
    let reparsed = parse(&ctx, &printed, DataParserFlags::empty());
    assert!(reparsed.is_ok());
}

#[test]
fn data_anyxml() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ctx = Context::new(ContextFlags::empty()).unwrap();
    ctx.parse_module_str(
        r###"module anyhost {
            namespace "urn:example:anyhost";
            prefix ah;
            container report {
                anyxml payload;
            }
        }"###,
        yangtree::schema::SchemaInputFormat::YANG,
    )
    .unwrap();

    let xml = r###"<report xmlns="urn:example:anyhost">
  <payload><a><b>1</b></a><c/></payload>
</report>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::empty()).unwrap();
    let dnode = dtree.find_path("/anyhost:report/payload").unwrap();
    let anyxml = dnode.anyxml().expect("anyxml content");
    assert!(anyxml.contains("<b>1</b>"));
}

#[test]
fn data_metadata_attributes() {
    let ctx = create_context();

    let xml = r###"<interfaces xmlns="urn:example:network"
        xmlns:ift="urn:example:network-types"
        xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0">
  <interface nc:operation="merge">
    <name>eth0</name>
    <type>ift:ethernet</type>
  </interface>
</interfaces>"###;
    let dtree = parse(&ctx, xml, DataParserFlags::empty()).unwrap();
    let dnode = dtree
        .find_path("/network:interfaces/interface[name='eth0']")
        .unwrap();
    let meta: Vec<(String, String)> = dnode
        .meta()
        .map(|meta| (meta.name().to_string(), meta.value().to_string()))
        .collect();
    assert_eq!(
        meta,
        vec![("operation".to_string(), "merge".to_string())]
    );
}
