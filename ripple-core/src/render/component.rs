//! Components.
//!
//! A [`Component`] is a definition: an optional setup function and a render
//! function. Mounting a component vnode creates a [`ComponentInstance`],
//! which owns the per-mount state:
//!
//! - props (seen by setup and render as a shallow read-only wrapper)
//! - slots passed by the parent
//! - the state object returned by setup (seen by render as a mutable wrapper)
//! - the provided-value table and a weak link to the parent instance
//! - the rendered subtree and the render effect that keeps it current
//!
//! # Lookups
//!
//! [`RenderContext::get`] looks a name up in the setup state first, then in
//! the props, then in the instance properties (`$props`, `$el`).
//! [`SetupContext::inject`] walks the parent chain upward and returns the
//! nearest provided value.
//!
//! While setup runs, [`current_instance`] returns the instance being set up.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::host::HostNode;
use super::vnode::{Props, Slots, VNode};
use crate::compiler::{self, CompileError};
use crate::reactive::{
    reactive, shallow_readonly, untracked, Key, Reactive, Subscriber, Target, Value,
};
use crate::shared::{camelize, to_handler_key};

/// Setup function: receives read-only props and the setup context, returns
/// the state object render reads from.
pub type SetupFn = Arc<dyn Fn(&Reactive, &SetupContext) -> Target + Send + Sync>;

/// Render function: builds the component's subtree.
pub type RenderFn = Arc<dyn Fn(&RenderContext) -> VNode + Send + Sync>;

type Hook = Arc<dyn Fn() + Send + Sync>;

thread_local! {
    static CURRENT_INSTANCE: RefCell<Option<Arc<ComponentInstance>>> = const { RefCell::new(None) };
}

/// The instance whose setup function is running on this thread.
pub fn current_instance() -> Option<Arc<ComponentInstance>> {
    CURRENT_INSTANCE.with(|current| current.borrow().clone())
}

/// Restores the previous current instance when dropped.
struct CurrentInstanceGuard {
    previous: Option<Arc<ComponentInstance>>,
}

impl CurrentInstanceGuard {
    fn enter(instance: &Arc<ComponentInstance>) -> Self {
        let previous = CURRENT_INSTANCE.with(|current| current.replace(Some(instance.clone())));
        Self { previous }
    }
}

impl Drop for CurrentInstanceGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_INSTANCE.with(|current| *current.borrow_mut() = previous);
    }
}

/// A component definition.
#[derive(Clone)]
pub struct Component {
    name: Arc<str>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
}

impl Component {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            setup: None,
            render: None,
        }
    }

    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&Reactive, &SetupContext) -> Target + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(setup));
        self
    }

    pub fn with_render<F>(mut self, render: F) -> Self
    where
        F: Fn(&RenderContext) -> VNode + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    /// Compile a template into this component's render function.
    pub fn with_template(mut self, template: &str) -> Result<Self, CompileError> {
        self.render = Some(compiler::compile(template)?);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_render(&self) -> bool {
        self.render.is_some()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("setup", &self.setup.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}

/// Unique identifier for a mounted component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A mounted component.
pub struct ComponentInstance {
    id: InstanceId,
    def: Arc<Component>,
    parent: Option<Weak<ComponentInstance>>,
    provides: Mutex<IndexMap<Key, Value>>,
    state: Mutex<InstanceState>,
    hooks: Mutex<Hooks>,
    pub(crate) update: OnceLock<Subscriber>,
    unmounted: AtomicBool,
}

struct InstanceState {
    props: Target,
    slots: Slots,
    setup_state: Target,
    sub_tree: Option<VNode>,
    /// Props and slots from a parent re-render, applied before the next pass.
    next: Option<(Props, Slots)>,
    mounted: bool,
}

#[derive(Default)]
struct Hooks {
    mounted: Vec<Hook>,
    updated: Vec<Hook>,
}

impl ComponentInstance {
    pub(crate) fn new(
        def: Arc<Component>,
        props: &Props,
        slots: Slots,
        parent: Option<&Arc<ComponentInstance>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: InstanceId::next(),
            def,
            parent: parent.map(Arc::downgrade),
            provides: Mutex::new(IndexMap::new()),
            state: Mutex::new(InstanceState {
                props: props.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                slots,
                setup_state: Target::new(),
                sub_tree: None,
                next: None,
                mounted: false,
            }),
            hooks: Mutex::new(Hooks::default()),
            update: OnceLock::new(),
            unmounted: AtomicBool::new(false),
        })
    }

    /// Run the definition's setup function, without tracking its reads.
    pub(crate) fn setup(self: &Arc<Self>) {
        let Some(setup) = self.def.setup.clone() else {
            return;
        };

        let ctx = SetupContext {
            instance: Arc::downgrade(self),
        };
        let props = self.props();
        let state = {
            let _current = CurrentInstanceGuard::enter(self);
            untracked(|| setup(&props, &ctx))
        };
        self.state.lock().setup_state = state;
    }

    /// Call the render function, tracking its reads in the running effect.
    pub(crate) fn render(self: &Arc<Self>) -> VNode {
        let ctx = {
            let state = self.state.lock();
            RenderContext {
                state: reactive(state.setup_state.clone()),
                props: shallow_readonly(state.props.clone()),
                slots: state.slots.clone(),
                instance: Arc::downgrade(self),
            }
        };

        match &self.def.render {
            Some(render) => render(&ctx),
            None => {
                warn!(component = %self.def.name, "component is missing a render function");
                VNode::fragment(Vec::new())
            }
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn parent(&self) -> Option<Arc<ComponentInstance>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Props as setup and render see them.
    pub fn props(&self) -> Reactive {
        shallow_readonly(self.state.lock().props.clone())
    }

    /// The state object returned by setup, as render sees it.
    pub fn setup_state(&self) -> Reactive {
        reactive(self.state.lock().setup_state.clone())
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted.load(Ordering::Acquire)
    }

    /// Re-render now, applying pending props first.
    pub fn update(&self) {
        if let Some(update) = self.update.get() {
            update.run();
        }
    }

    pub(crate) fn mark_mounted(&self) {
        self.state.lock().mounted = true;
    }

    pub(crate) fn take_sub_tree(&self) -> Option<VNode> {
        self.state.lock().sub_tree.take()
    }

    pub(crate) fn set_sub_tree(&self, tree: VNode) {
        self.state.lock().sub_tree = Some(tree);
    }

    pub(crate) fn set_next(&self, props: &Props, slots: Slots) {
        self.state.lock().next = Some((props.clone(), slots));
    }

    /// Move pending props into place. The props target is updated in place so
    /// wrappers handed to setup keep seeing current values.
    pub(crate) fn apply_next(&self) {
        let mut state = self.state.lock();
        let Some((props, slots)) = state.next.take() else {
            return;
        };
        for key in state.props.keys_raw() {
            if !props.contains_key(&key) {
                state.props.remove_raw(&key);
            }
        }
        for (key, value) in props {
            state.props.insert_raw(&key, value);
        }
        state.slots = slots;
    }

    /// Stop the render effect and refuse further updates.
    pub(crate) fn mark_unmounted(&self) {
        self.unmounted.store(true, Ordering::Release);
        if let Some(update) = self.update.get() {
            update.stop();
        }
        debug!(component = %self.def.name, id = self.id.raw(), "component unmounted");
    }

    /// The first host node of the rendered subtree, once mounted.
    pub fn el(&self) -> Option<HostNode> {
        self.first_host_node()
    }

    pub(crate) fn first_host_node(&self) -> Option<HostNode> {
        self.state
            .lock()
            .sub_tree
            .as_ref()
            .and_then(VNode::first_host_node)
    }

    pub(crate) fn collect_host_nodes(&self, out: &mut Vec<HostNode>) {
        if let Some(tree) = &self.state.lock().sub_tree {
            tree.collect_host_nodes(out);
        }
    }

    pub(crate) fn run_mounted_hooks(&self) {
        let hooks = std::mem::take(&mut self.hooks.lock().mounted);
        for hook in hooks {
            hook();
        }
    }

    pub(crate) fn run_updated_hooks(&self) {
        let hooks = self.hooks.lock().updated.clone();
        for hook in hooks {
            hook();
        }
    }

    fn provided(&self, key: &str) -> Option<Value> {
        self.provides.lock().get(key).cloned()
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("name", &self.def.name)
            .field("unmounted", &self.is_unmounted())
            .finish()
    }
}

/// What setup can do besides reading props.
///
/// Holds a weak reference, so it can be captured by handlers stored in the
/// component's own state.
#[derive(Clone)]
pub struct SetupContext {
    instance: Weak<ComponentInstance>,
}

impl SetupContext {
    /// The instance being set up, while it is alive.
    pub fn instance(&self) -> Option<Arc<ComponentInstance>> {
        self.instance.upgrade()
    }

    /// Call the `on<Event>` handler the parent passed as a prop, if any.
    ///
    /// Event names may be kebab-case: `emit("add-one", ..)` calls `onAddOne`.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let Some(instance) = self.instance.upgrade() else {
            return;
        };
        let handler_key = to_handler_key(&camelize(event));
        let handler = instance.state.lock().props.get_raw(&handler_key);
        if let Some(Value::Handler(handler)) = handler {
            handler.call(args);
        }
    }

    /// Make a value available to every descendant.
    pub fn provide(&self, key: &str, value: impl Into<Value>) {
        if let Some(instance) = self.instance.upgrade() {
            instance.provides.lock().insert(Key::from(key), value.into());
        }
    }

    /// The value provided under `key` by the nearest ancestor.
    pub fn inject(&self, key: &str) -> Option<Value> {
        let mut current = self.instance.upgrade()?.parent();
        while let Some(ancestor) = current {
            if let Some(value) = ancestor.provided(key) {
                return Some(value);
            }
            current = ancestor.parent();
        }
        None
    }

    pub fn inject_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.inject(key).unwrap_or_else(|| default.into())
    }

    /// Run `f` once, after the first render pass is in the host.
    pub fn on_mounted<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Some(instance) = self.instance.upgrade() {
            instance.hooks.lock().mounted.push(Arc::new(f));
        }
    }

    /// Run `f` after every later render pass.
    pub fn on_updated<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Some(instance) = self.instance.upgrade() {
            instance.hooks.lock().updated.push(Arc::new(f));
        }
    }
}

/// What a render function can read.
pub struct RenderContext {
    state: Reactive,
    props: Reactive,
    slots: Slots,
    instance: Weak<ComponentInstance>,
}

impl RenderContext {
    /// Look a name up in the setup state, then in the props.
    ///
    /// `$props` yields the props wrapper and `$el` the raw handle of the
    /// previous pass's first host node (`Null` on the first pass). Unknown
    /// names read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        if self.state.has(key) {
            return self.state.get(key);
        }
        if self.props.has(key) {
            return self.props.get(key);
        }
        match key {
            "$props" => Value::Proxy(self.props.clone()),
            "$el" => self
                .el()
                .map_or(Value::Null, |el| Value::Number(el.raw() as f64)),
            _ => Value::Null,
        }
    }

    /// The first host node of the subtree currently in the host.
    pub fn el(&self) -> Option<HostNode> {
        self.instance.upgrade()?.first_host_node()
    }

    /// The slots the parent passed.
    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Resolve a dotted path such as `user.name`.
    pub fn path(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let mut value = match segments.next() {
            Some(first) => self.get(first.trim()),
            None => return Value::Null,
        };
        for segment in segments {
            value = match &value {
                Value::Proxy(proxy) => proxy.get(segment.trim()),
                Value::Object(target) => reactive(target.clone()).get(segment.trim()),
                _ => return Value::Null,
            };
        }
        value
    }

    pub fn props(&self) -> &Reactive {
        &self.props
    }

    pub fn state(&self) -> &Reactive {
        &self.state
    }

    /// Render a named slot wrapped in a fragment. Missing slots render an
    /// empty fragment.
    pub fn render_slot(&self, name: &str, props: &Props) -> VNode {
        match self.slots.get(name) {
            Some(slot) => VNode::fragment(slot.call(props)),
            None => VNode::fragment(Vec::new()),
        }
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }
}

/// Props changed if any key was added, removed or now holds a different
/// value.
pub(crate) fn should_update(prev: Option<&Props>, next: Option<&Props>) -> bool {
    let empty = Props::new();
    let prev = prev.unwrap_or(&empty);
    let next = next.unwrap_or(&empty);

    prev.len() != next.len()
        || next
            .iter()
            .any(|(key, value)| prev.get(key).map_or(true, |old| !old.same(value)))
}
