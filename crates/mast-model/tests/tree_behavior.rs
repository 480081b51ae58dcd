//! End-to-end behavior of the node tree: hook pipelines, subscription
//! delivery, and hierarchical propagation.

use mast_model::{
    AddressSpace, AddressSpaceBuilder, HookError, HookVerdict, ModelError, NumericInit,
    SubscriptionFilter, VariableHook,
};
use mast_types::Value;
use std::collections::BTreeMap;

fn press() -> AddressSpace {
    AddressSpaceBuilder::new("press-7")
        .numeric("root", "n", NumericInit::new(5.0).bounds(0.0, 10.0))
        .expect("n")
        .boolean("root", "b", false)
        .expect("b")
        .object("root", "obj")
        .expect("obj")
        .string("root/obj", "s", "")
        .expect("s")
        .build()
}

#[test]
fn write_then_read_roundtrip() {
    let mut space = press();
    let b = space.resolve_path("root/b").expect("b");
    space.write(b, Value::from(true)).expect("accepted");
    assert_eq!(space.read(b).expect("read"), Value::from(true));
}

#[test]
fn post_read_transform_is_observable() {
    let mut space = press();
    let n = space.resolve_path("root/n").expect("n");
    space
        .bind_variable_hook(
            n,
            VariableHook::PostRead(Box::new(|v| {
                Ok(Value::from(v.as_num().unwrap_or(0.0) + 100.0))
            })),
        )
        .expect("bind");
    // the stored value is 5, the caller observes the transform
    assert_eq!(space.read(n).expect("read"), Value::from(105.0));
}

#[test]
fn pre_update_veto_blocks_assignment() {
    let mut space = press();
    let n = space.resolve_path("root/n").expect("n");
    space
        .bind_variable_hook(
            n,
            VariableHook::PreUpdate(Box::new(|proposed| {
                Ok(match proposed.as_num() {
                    Some(v) if v > 7.0 => HookVerdict::Reject,
                    _ => HookVerdict::Accept,
                })
            })),
        )
        .expect("bind");

    assert_eq!(
        space.write(n, Value::from(9.0)).expect_err("vetoed"),
        ModelError::Vetoed
    );
    assert_eq!(space.read(n).expect("unchanged"), Value::from(5.0));
    space.write(n, Value::from(6.0)).expect("below the veto line");
}

#[test]
fn post_update_veto_restores_previous_value() {
    let mut space = press();
    let n = space.resolve_path("root/n").expect("n");
    space
        .bind_variable_hook(
            n,
            VariableHook::PostUpdate(Box::new(|_prev, new| {
                Ok(if new.as_num() == Some(7.0) {
                    HookVerdict::Reject
                } else {
                    HookVerdict::Accept
                })
            })),
        )
        .expect("bind");

    assert_eq!(
        space.write(n, Value::from(7.0)).expect_err("post veto"),
        ModelError::PostVetoed
    );
    assert_eq!(space.read(n).expect("restored"), Value::from(5.0));
}

#[test]
fn failing_post_update_hook_rolls_back() {
    let mut space = press();
    let n = space.resolve_path("root/n").expect("n");
    space
        .bind_variable_hook(
            n,
            VariableHook::PostUpdate(Box::new(|_, _| Err(HookError::new("sensor offline")))),
        )
        .expect("bind");

    let err = space.write(n, Value::from(6.0)).expect_err("hook failed");
    assert!(matches!(err, ModelError::HookFailed(_)));
    assert_eq!(space.read(n).expect("rolled back"), Value::from(5.0));
}

#[test]
fn failing_pre_read_hook_aborts_the_read() {
    let mut space = press();
    let b = space.resolve_path("root/b").expect("b");
    space
        .bind_variable_hook(
            b,
            VariableHook::PreRead(Box::new(|| Err(HookError::new("not sampled yet")))),
        )
        .expect("bind");
    assert!(matches!(space.read(b), Err(ModelError::HookFailed(_))));
}

#[test]
fn deadband_subscription_counts_notifications() {
    let mut space = press();
    let n = space.resolve_path("root/n").expect("n");
    space
        .subscribe(n, "gw", SubscriptionFilter::deadband(2.0))
        .expect("subscribe");

    // 5 -> 6 -> 5: both inside the deadband around the last report of 5
    let w1 = space.write(n, Value::from(6.0)).expect("w1");
    let w2 = space.write(n, Value::from(5.0)).expect("w2");
    assert!(w1.notifications.is_empty());
    assert!(w2.notifications.is_empty());

    // 5 -> 8 exceeds it
    let w3 = space.write(n, Value::from(8.0)).expect("w3");
    assert_eq!(w3.notifications.len(), 1);
    assert_eq!(w3.notifications[0].value, Value::from(8.0));
}

#[test]
fn every_accepted_write_notifies_an_all_subscriber_exactly_once() {
    let mut space = press();
    let b = space.resolve_path("root/b").expect("b");
    space
        .subscribe(b, "gw", SubscriptionFilter::All)
        .expect("subscribe");

    let mut count = 0;
    for v in [true, false, false] {
        count += space
            .write(b, Value::from(v))
            .expect("accepted")
            .notifications
            .len();
    }
    assert_eq!(count, 3);

    // a rejected write notifies nobody
    let n = space.resolve_path("root/n").expect("n");
    space.subscribe(n, "gw", SubscriptionFilter::All).expect("subscribe");
    assert!(space.write(n, Value::from(99.0)).is_err());
}

#[test]
fn property_write_notifies_property_then_object() {
    let mut space = press();
    let obj = space.resolve_path("root/obj").expect("obj");
    let s = space.resolve_path("root/obj/s").expect("s");

    space
        .subscribe(obj, "s-obj", SubscriptionFilter::All)
        .expect("object subscriber");
    space
        .subscribe(s, "s-prop", SubscriptionFilter::All)
        .expect("property subscriber");

    let outcome = space.write(s, Value::from("x")).expect("accepted");
    assert_eq!(outcome.notifications.len(), 2);

    // property subscribers fire first, with the scalar value
    assert_eq!(outcome.notifications[0].subscriber, "s-prop");
    assert_eq!(outcome.notifications[0].value, Value::from("x"));

    // then the object subscriber, with the composite value
    assert_eq!(outcome.notifications[1].subscriber, "s-obj");
    let mut expected = BTreeMap::new();
    expected.insert("s".to_string(), Value::from("x"));
    assert_eq!(outcome.notifications[1].value, Value::Object(expected));
}

#[test]
fn nested_objects_propagate_bottom_up() {
    let mut space = AddressSpaceBuilder::new("nested")
        .object("root", "outer")
        .expect("outer")
        .object("root/outer", "inner")
        .expect("inner")
        .numeric("root/outer/inner", "v", 0.0)
        .expect("v")
        .build();

    let outer = space.resolve_path("root/outer").expect("outer");
    let inner = space.resolve_path("root/outer/inner").expect("inner");
    let v = space.resolve_path("root/outer/inner/v").expect("v");

    space.subscribe(v, "on-v", SubscriptionFilter::All).expect("v sub");
    space
        .subscribe(inner, "on-inner", SubscriptionFilter::All)
        .expect("inner sub");
    space
        .subscribe(outer, "on-outer", SubscriptionFilter::All)
        .expect("outer sub");

    let outcome = space.write(v, Value::from(1.0)).expect("accepted");
    let order: Vec<&str> = outcome
        .notifications
        .iter()
        .map(|n| n.subscriber.as_str())
        .collect();
    assert_eq!(order, ["on-v", "on-inner", "on-outer"]);
}

#[test]
fn folders_do_not_propagate() {
    let mut space = AddressSpaceBuilder::new("flat")
        .folder("root", "cell")
        .expect("cell")
        .numeric("root/cell", "t", 0.0)
        .expect("t")
        .build();

    let t = space.resolve_path("root/cell/t").expect("t");
    space.subscribe(t, "gw", SubscriptionFilter::All).expect("sub");

    let outcome = space.write(t, Value::from(2.0)).expect("accepted");
    // only the variable's own subscriber; the folder chain adds nothing
    assert_eq!(outcome.notifications.len(), 1);
}

#[test]
fn removal_drops_subscriptions_with_the_node() {
    let mut space = press();
    let n = space.resolve_path("root/n").expect("n");
    let sub = space.subscribe(n, "gw", SubscriptionFilter::All).expect("sub");
    assert!(space.has_subscription(n, sub));

    space.remove(n).expect("removable");
    assert!(!space.has_subscription(n, sub));
    assert!(matches!(space.read(n), Err(ModelError::NotFound(_))));
}

#[test]
fn unsubscribe_by_identity_clears_the_record() {
    let mut space = press();
    let n = space.resolve_path("root/n").expect("n");
    space.subscribe(n, "gw", SubscriptionFilter::All).expect("sub");
    assert_eq!(space.unsubscribe_subscriber(n, "gw").expect("count"), 1);
    let outcome = space.write(n, Value::from(1.0)).expect("accepted");
    assert!(outcome.notifications.is_empty());
}

#[test]
fn method_invocation_with_hooks() {
    let mut space = press();
    let root = space.root();
    let double = space
        .add_method(
            root,
            "double",
            mast_model::MethodFlavor::Sync,
            vec![mast_model::Template::new("x", mast_types::DataType::Num)],
            vec![mast_model::Template::new("y", mast_types::DataType::Num)],
        )
        .expect("method");

    // unbound methods are not invocable
    let err = space
        .invoke_method(double, vec![Value::from(2.0)])
        .expect_err("unbound");
    assert!(matches!(err, ModelError::UnboundCallback(_)));

    space
        .bind_method_callback(
            double,
            Box::new(|args| {
                let x = args
                    .get("x")
                    .and_then(Value::as_num)
                    .ok_or_else(|| HookError::new("x missing"))?;
                Ok(vec![Value::from(x * 2.0)])
            }),
        )
        .expect("bind");
    space
        .bind_pre_invoke(
            double,
            Box::new(|args| {
                if args.contains_key("x") {
                    Ok(())
                } else {
                    Err(HookError::new("x required"))
                }
            }),
        )
        .expect("pre");

    let ret = space
        .invoke_method(double, vec![Value::from(21.0)])
        .expect("invocable");
    assert_eq!(ret.get("y"), Some(&Value::from(42.0)));
}
