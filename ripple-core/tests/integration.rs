//! Integration Tests for the Render Cycle
//!
//! These tests drive reactive state, the batching queue, components, the
//! diff engine and the template compiler together through a `MemoryHost`.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use ripple_core::compiler::CompileError;
use ripple_core::reactive::{reactive, readonly, Computed, Handler, Reactive, Ref, Target, Value};
use parking_lot::Mutex;
use ripple_core::render::{Component, HostNode, HostOp, MemoryHost, Props, Renderer, VNode};
use ripple_core::scheduler::{ManualTicker, TokioDefer};
use ripple_core::{Config, Error};

struct Harness {
    host: Arc<MemoryHost>,
    ticker: Arc<ManualTicker>,
    renderer: Renderer,
    root: HostNode,
}

fn harness() -> Harness {
    let host = Arc::new(MemoryHost::new());
    let ticker = Arc::new(ManualTicker::new());
    let renderer = Renderer::new(host.clone(), ticker.clone());
    let root = host.create_root();
    Harness {
        host,
        ticker,
        renderer,
        root,
    }
}

/// A component whose setup hands back `state`.
fn with_state(name: &str, state: &Reactive) -> Component {
    let raw = state.to_raw();
    Component::new(name).with_setup(move |_, _| raw.clone())
}

/// Test that a computed is lazy and re-evaluates once per change.
#[test]
fn computed_getter_runs_once_per_change() {
    let state = reactive(Target::from_iter([("foo", 1)]));
    let runs = Arc::new(AtomicI32::new(0));

    let computed = {
        let state = state.clone();
        let runs = runs.clone();
        Computed::new(move || {
            runs.fetch_add(1, Ordering::SeqCst);
            state.get("foo")
        })
    };

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(computed.get(), Value::from(1));
    computed.get();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    state.set("foo", 2);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(computed.get(), Value::from(2));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that several writes before a tick produce a single re-render.
#[test]
fn writes_are_batched_into_one_render() {
    let h = harness();
    let state = reactive(Target::from_iter([("count", 0)]));
    let renders = Arc::new(AtomicI32::new(0));

    let component = {
        let renders = renders.clone();
        with_state("Counter", &state).with_render(move |ctx| {
            renders.fetch_add(1, Ordering::SeqCst);
            VNode::element("span").with_text(&ripple_core::reactive::to_display_string(
                &ctx.get("count"),
            ))
        })
    };
    h.renderer.create_app(component).mount(h.root).unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    state.set("count", 1);
    state.set("count", 2);
    state.set("count", 3);

    // Nothing happens until the queue is flushed.
    assert_eq!(h.host.inner_html(h.root), "<span>0</span>");
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    h.ticker.tick();
    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert_eq!(h.host.inner_html(h.root), "<span>3</span>");
}

/// Test that reordering a keyed list re-uses every host node.
#[test]
fn keyed_reorder_moves_without_recreating() {
    let h = harness();
    let state = reactive(Target::from_iter([("order", "a,b,c,d")]));

    let component = with_state("List", &state).with_render(|ctx| {
        let order = ctx.get("order");
        let items = order
            .as_str()
            .unwrap_or_default()
            .split(',')
            .filter(|key| !key.is_empty())
            .map(|key| VNode::element("li").with_prop("key", key).with_text(key))
            .collect::<Vec<_>>();
        VNode::element("ul").with_children(items)
    });
    h.renderer.create_app(component).mount(h.root).unwrap();
    assert_eq!(h.host.text_content(h.root), "abcd");

    h.host.clear_ops();
    state.set("order", "a,c,b,d");
    h.ticker.tick();

    let ops = h.host.take_ops();
    let inserts = ops
        .iter()
        .filter(|op| matches!(op, HostOp::Insert { .. }))
        .count();
    assert_eq!(inserts, 1);
    assert!(!ops
        .iter()
        .any(|op| matches!(op, HostOp::CreateElement { .. } | HostOp::Remove { .. })));
    assert_eq!(h.host.text_content(h.root), "acbd");

    state.set("order", "a,c,d");
    h.ticker.tick();
    let removes = h
        .host
        .take_ops()
        .into_iter()
        .filter(|op| matches!(op, HostOp::Remove { .. }))
        .count();
    assert_eq!(removes, 1);
    assert_eq!(h.host.text_content(h.root), "acd");

    state.set("order", "a,c,d,e");
    h.ticker.tick();
    assert_eq!(h.host.text_content(h.root), "acde");
}

/// Test that a parent re-render patches a child's props.
#[test]
fn parent_update_patches_child_props() {
    let h = harness();
    let state = reactive(Target::from_iter([("tone", "calm")]));

    let child = Arc::new(Component::new("Badge").with_render(|ctx| {
        VNode::element("b")
            .with_prop("class", ctx.get("tone"))
            .with_text("!")
    }));
    let parent = {
        let child = child.clone();
        with_state("Parent", &state).with_render(move |ctx| {
            VNode::element("div")
                .with_children(vec![VNode::component(child.clone()).with_prop("tone", ctx.get("tone"))])
        })
    };
    let app = h.renderer.create_app(parent);
    app.mount(h.root).unwrap();
    assert_eq!(h.host.inner_html(h.root), r#"<div><b class="calm">!</b></div>"#);

    h.host.clear_ops();
    state.set("tone", "loud");
    h.ticker.tick();

    let ops = h.host.take_ops();
    assert!(ops.iter().any(|op| matches!(
        op,
        HostOp::PatchProp { key, value: Some(v), .. } if key == "class" && v == "loud"
    )));
    assert!(!ops
        .iter()
        .any(|op| matches!(op, HostOp::CreateElement { .. })));
    assert_eq!(h.host.inner_html(h.root), r#"<div><b class="loud">!</b></div>"#);
}

/// Test that a compiled template renders and stays reactive.
#[test]
fn template_renders_interpolation() {
    let h = harness();
    let state = reactive(Target::from_iter([("message", "mini-vue")]));

    let component = with_state("Hello", &state)
        .with_template("<div>hi, {{message}}</div>")
        .unwrap();
    h.renderer.create_app(component).mount(h.root).unwrap();
    assert_eq!(h.host.inner_html(h.root), "<div>hi, mini-vue</div>");

    state.set("message", "ripple");
    h.ticker.tick();
    assert_eq!(h.host.inner_html(h.root), "<div>hi, ripple</div>");
}

/// Test that refs in setup state are unwrapped for templates.
#[test]
fn template_reads_through_refs() {
    let h = harness();
    let count = Ref::new(1);
    let component = {
        let count = count.clone();
        Component::new("Count")
            .with_setup(move |_, _| Target::new().with("count", count.clone()))
            .with_template("<p>{{ count }}</p>")
            .unwrap()
    };
    h.renderer.create_app(component).mount(h.root).unwrap();
    assert_eq!(h.host.inner_html(h.root), "<p>1</p>");

    count.set(2);
    h.ticker.tick();
    assert_eq!(h.host.inner_html(h.root), "<p>2</p>");
}

/// Test that a structural template error aborts compilation.
#[test]
fn unclosed_element_fails_to_compile() {
    let err = Component::new("Broken")
        .with_template("<div><span></div>")
        .unwrap_err();
    assert_eq!(err, CompileError::MissingEndTag { tag: "span".into() });

    let err: Error = err.into();
    assert_eq!(err.to_string(), "missing end tag for <span>");
}

/// Test that writes through a read-only wrapper are ignored.
#[test]
fn readonly_writes_are_rejected() {
    let target = Target::from_iter([("a", 1)]);
    let view = readonly(target.clone());
    let live = reactive(target);

    let seen = Arc::new(AtomicI32::new(0));
    let _runner = {
        let live = live.clone();
        let seen = seen.clone();
        ripple_core::reactive::effect(move || {
            live.get("a");
            seen.fetch_add(1, Ordering::SeqCst);
        })
    };

    assert!(!view.set("a", 2));
    assert_eq!(view.get("a"), Value::from(1));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    assert!(live.set("a", 2));
    assert_eq!(view.get("a"), Value::from(2));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

/// Test that a child's emitted event reaches the parent's handler.
#[test]
fn emit_calls_the_parent_handler() {
    let h = harness();
    let received = Arc::new(AtomicI32::new(0));

    let child = Arc::new(
        Component::new("Button")
            .with_setup(|_, ctx| {
                let ctx = ctx.clone();
                let click = Handler::new(move |_| {
                    ctx.emit("add-one", &[Value::from(1)]);
                    Value::Null
                });
                Target::new().with("click", click)
            })
            .with_render(|ctx| VNode::element("button").with_prop("onClick", ctx.get("click"))),
    );

    let parent = {
        let child = child.clone();
        let received = received.clone();
        let on_add_one = Handler::new(move |args| {
            let step = args.first().and_then(Value::as_number).unwrap_or_default();
            received.fetch_add(step as i32, Ordering::SeqCst);
            Value::Null
        });
        Component::new("Parent").with_render(move |_| {
            VNode::component(child.clone()).with_prop("onAddOne", on_add_one.clone())
        })
    };
    h.renderer.create_app(parent).mount(h.root).unwrap();

    let button = h.host.children(h.root)[0];
    assert!(h.host.dispatch(button, "click", &[]));
    assert!(h.host.dispatch(button, "click", &[]));
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

/// Test that injected values come from the nearest ancestor.
#[test]
fn provide_and_inject_across_levels() {
    let h = harness();

    let leaf = Arc::new(
        Component::new("Leaf")
            .with_setup(|_, ctx| {
                Target::new()
                    .with("theme", ctx.inject_or("theme", "light"))
                    .with("size", ctx.inject_or("size", "m"))
            })
            .with_template("<i>{{theme}}/{{size}}</i>")
            .unwrap(),
    );
    let middle = {
        let leaf = leaf.clone();
        Arc::new(
            Component::new("Middle")
                .with_setup(|_, ctx| {
                    ctx.provide("theme", "dark");
                    Target::new()
                })
                .with_render(move |_| VNode::component(leaf.clone())),
        )
    };
    let outer = {
        let middle = middle.clone();
        let leaf = leaf.clone();
        Component::new("Outer")
            .with_setup(|_, ctx| {
                ctx.provide("theme", "sepia");
                ctx.provide("size", "xl");
                Target::new()
            })
            .with_render(move |_| {
                VNode::fragment(vec![
                    VNode::component(middle.clone()),
                    VNode::component(leaf.clone()),
                ])
            })
    };
    h.renderer.create_app(outer).mount(h.root).unwrap();

    assert_eq!(h.host.inner_html(h.root), "<i>dark/xl</i><i>sepia/xl</i>");
}

/// Test that lifecycle hooks run after the matching render pass.
#[test]
fn mounted_and_updated_hooks() {
    let h = harness();
    let state = reactive(Target::from_iter([("n", 0)]));
    let mounted = Arc::new(AtomicI32::new(0));
    let updated = Arc::new(AtomicI32::new(0));

    let component = {
        let raw = state.to_raw();
        let mounted = mounted.clone();
        let updated = updated.clone();
        Component::new("Hooks")
            .with_setup(move |_, ctx| {
                let mounted = mounted.clone();
                let updated = updated.clone();
                ctx.on_mounted(move || {
                    mounted.fetch_add(1, Ordering::SeqCst);
                });
                ctx.on_updated(move || {
                    updated.fetch_add(1, Ordering::SeqCst);
                });
                raw.clone()
            })
            .with_template("<p>{{n}}</p>")
            .unwrap()
    };
    h.renderer.create_app(component).mount(h.root).unwrap();
    assert_eq!(mounted.load(Ordering::SeqCst), 1);
    assert_eq!(updated.load(Ordering::SeqCst), 0);

    state.set("n", 1);
    h.ticker.tick();
    state.set("n", 2);
    h.ticker.tick();
    assert_eq!(mounted.load(Ordering::SeqCst), 1);
    assert_eq!(updated.load(Ordering::SeqCst), 2);
}

/// Test that writes after unmount never reach the host.
#[test]
fn unmounted_app_ignores_updates() {
    let h = harness();
    let state = reactive(Target::from_iter([("message", "a")]));

    let component = with_state("Gone", &state)
        .with_template("<p>{{message}}</p>")
        .unwrap();
    let app = h.renderer.create_app(component);
    app.mount(h.root).unwrap();
    app.unmount().unwrap();
    assert_eq!(h.host.inner_html(h.root), "");

    h.host.clear_ops();
    state.set("message", "b");
    h.ticker.tick();
    assert!(h.host.ops().is_empty());
}

/// Test that an app dropped right after mounting keeps its tree reactive.
#[test]
fn temporary_app_keeps_the_tree_reactive() {
    let h = harness();
    let state = reactive(Target::from_iter([("count", 0)]));

    let component = with_state("Counter", &state)
        .with_template("<span>{{count}}</span>")
        .unwrap();
    h.renderer.create_app(component).mount(h.root).unwrap();

    for n in 1..=3 {
        state.set("count", n);
        h.ticker.tick();
        assert_eq!(h.host.inner_html(h.root), format!("<span>{n}</span>"));
    }
}

fn numbered_items(count: usize) -> Vec<VNode> {
    (0..count)
        .map(|i| VNode::element("li").with_text(&i.to_string()))
        .collect()
}

fn count_of(value: Value) -> usize {
    value.as_number().unwrap_or_default() as usize
}

/// Test that a multi-root child that grows stays before its next sibling.
#[test]
fn multi_root_child_grows_in_place() {
    let h = harness();
    let state = reactive(Target::from_iter([("n", 1)]));

    let list = Arc::new(
        with_state("Items", &state)
            .with_render(|ctx| VNode::fragment(numbered_items(count_of(ctx.get("n"))))),
    );
    let parent = Component::new("Page").with_render(move |_| {
        VNode::element("div").with_children(vec![
            VNode::component(list.clone()),
            VNode::element("p").with_text("end"),
        ])
    });
    h.renderer.create_app(parent).mount(h.root).unwrap();
    assert_eq!(h.host.inner_html(h.root), "<div><li>0</li><p>end</p></div>");

    state.set("n", 3);
    h.ticker.tick();
    assert_eq!(
        h.host.inner_html(h.root),
        "<div><li>0</li><li>1</li><li>2</li><p>end</p></div>"
    );

    state.set("n", 2);
    h.ticker.tick();
    assert_eq!(
        h.host.inner_html(h.root),
        "<div><li>0</li><li>1</li><p>end</p></div>"
    );
}

/// Test that slot content that grows stays before the slot owner's siblings.
#[test]
fn slot_output_grows_in_place() {
    let h = harness();
    let state = reactive(Target::from_iter([("n", 1)]));

    let card = Arc::new(
        Component::new("Card").with_render(|ctx| ctx.render_slot("default", &Props::new())),
    );
    let parent = {
        let state = state.clone();
        Component::new("Page").with_render(move |_| {
            let state = state.clone();
            VNode::element("ul").with_children(vec![
                VNode::component(card.clone())
                    .with_slot("default", move |_| numbered_items(count_of(state.get("n")))),
                VNode::element("li").with_text("last"),
            ])
        })
    };
    h.renderer.create_app(parent).mount(h.root).unwrap();
    assert_eq!(h.host.inner_html(h.root), "<ul><li>0</li><li>last</li></ul>");

    state.set("n", 2);
    h.ticker.tick();
    assert_eq!(
        h.host.inner_html(h.root),
        "<ul><li>0</li><li>1</li><li>last</li></ul>"
    );
}

/// Test that render functions can reach `$el` and `$slots`.
#[test]
fn render_context_exposes_el_and_slots() {
    let h = harness();
    let state = reactive(Target::from_iter([("n", 0)]));
    let seen: Arc<Mutex<Vec<(Option<HostNode>, Value)>>> = Arc::new(Mutex::new(Vec::new()));

    let panel = Arc::new({
        let seen = seen.clone();
        with_state("Panel", &state).with_render(move |ctx| {
            seen.lock().push((ctx.el(), ctx.get("$el")));
            ctx.get("n");
            let mut children = Vec::new();
            if ctx.slots().contains_key("header") {
                children.push(VNode::element("h1").with_text("header"));
            }
            VNode::element("section").with_children(children)
        })
    });
    let parent = Component::new("Page").with_render(move |_| {
        VNode::component(panel.clone()).with_slot("header", |_| Vec::new())
    });
    h.renderer.create_app(parent).mount(h.root).unwrap();
    assert_eq!(h.host.inner_html(h.root), "<section><h1>header</h1></section>");

    state.set("n", 1);
    h.ticker.tick();

    let section = h.host.children(h.root)[0];
    let seen = seen.lock();
    assert_eq!(seen[0], (None, Value::Null));
    assert_eq!(
        seen[1],
        (Some(section), Value::Number(section.raw() as f64))
    );
}

/// Test that setup can reach its own instance.
#[test]
fn setup_sees_the_current_instance() {
    let h = harness();
    let names = Arc::new(Mutex::new(Vec::new()));

    let component = {
        let names = names.clone();
        Component::new("Current")
            .with_setup(move |_, _| {
                if let Some(instance) = ripple_core::render::current_instance() {
                    names.lock().push(instance.name().to_string());
                }
                Target::new()
            })
            .with_render(|_| VNode::text("ok"))
    };
    let app = h.renderer.create_app(component);
    app.mount(h.root).unwrap();

    assert_eq!(*names.lock(), vec!["Current".to_string()]);
    assert!(ripple_core::render::current_instance().is_none());
    assert_eq!(app.root_instance().map(|i| i.name().to_string()), Some("Current".to_string()));
}

/// Test that the recursion limit is configurable.
#[test]
fn renderer_uses_configured_limit() {
    let config = Config::from_json(r#"{ "scheduler": { "recursion_limit": 3 } }"#).unwrap();
    let host = Arc::new(MemoryHost::new());
    let renderer = Renderer::with_config(host, Arc::new(ManualTicker::new()), config);
    assert_eq!(renderer.queue().config().recursion_limit, 3);
}

/// Test the tokio-backed deferral path end to end.
#[tokio::test]
async fn tokio_flush_settles() {
    let host = Arc::new(MemoryHost::new());
    let renderer = Renderer::new(host.clone(), Arc::new(TokioDefer::current().unwrap()));
    let root = host.create_root();
    let state = reactive(Target::from_iter([("message", "before")]));

    let component = with_state("Async", &state)
        .with_template("<p>{{message}}</p>")
        .unwrap();
    renderer.create_app(component).mount(root).unwrap();

    state.set("message", "after");
    assert_eq!(host.inner_html(root), "<p>before</p>");

    renderer.queue().settled().await;
    assert_eq!(host.inner_html(root), "<p>after</p>");
}
