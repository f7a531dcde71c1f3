//! Tree Diff Engine
//!
//! The renderer compares the previous vnode tree with the next one and
//! applies the difference through the host adapter.
//!
//! # How It Works
//!
//! [`Renderer::patch`] dispatches on the next node's kind. A missing
//! previous node means "mount fresh"; a previous node of a different type or
//! key is replaced. Elements are patched children first, then props.
//!
//! Two lists of children are reconciled by [`Renderer::patch_keyed_children`]:
//!
//! 1. Trim the common head, then the common tail, patching in place.
//! 2. If only new nodes remain, mount them. If only old nodes remain, remove
//!    them.
//! 3. Otherwise match every remaining old node to a new position (by key, or
//!    by a linear scan for unkeyed nodes), remove the unmatched ones and
//!    patch the rest.
//! 4. If the matched old nodes are out of order, keep the longest run that
//!    is already in order and move only the others, walking back to front
//!    so each node's following sibling is already in place as an anchor.
//!
//! # Components
//!
//! Mounting a component runs its setup, then creates its render effect. The
//! effect's scheduler queues the update job on the renderer's [`JobQueue`],
//! so several writes before a tick produce one re-render.
//!
//! The renderer owns every root vnode mounted through an [`App`] until the
//! app unmounts it. Instances below a root are owned by their parent's
//! subtree, so the render effects themselves only hold weak references.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::app::App;
use super::component::{should_update, Component, ComponentInstance};
use super::host::{HostAdapter, HostNode};
use super::sequence::longest_increasing_subsequence;
use super::vnode::{Children, Props, Shape, VNode, VNodeKind};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::reactive::{EffectOptions, Key, Subscriber};
use crate::scheduler::{Defer, Job, JobId, JobQueue};

/// Drives a host adapter from vnode trees.
///
/// Cloning a renderer yields another handle to the same host and queue.
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<RendererInner>,
}

struct RendererInner {
    host: Arc<dyn HostAdapter>,
    queue: JobQueue,
    /// Root vnodes by container, kept alive while their app is mounted.
    roots: Mutex<HashMap<HostNode, VNode>>,
}

impl Renderer {
    pub fn new(host: Arc<dyn HostAdapter>, defer: Arc<dyn Defer>) -> Self {
        Self::with_config(host, defer, Config::default())
    }

    pub fn with_config(host: Arc<dyn HostAdapter>, defer: Arc<dyn Defer>, config: Config) -> Self {
        Self {
            inner: Arc::new(RendererInner {
                host,
                queue: JobQueue::with_config(defer, config.scheduler),
                roots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn host(&self) -> &Arc<dyn HostAdapter> {
        &self.inner.host
    }

    /// The queue component update jobs go through.
    pub fn queue(&self) -> &JobQueue {
        &self.inner.queue
    }

    /// Create an app that mounts `root` with this renderer.
    pub fn create_app(&self, root: impl Into<Arc<Component>>) -> App {
        App::new(self.clone(), root.into())
    }

    /// Mount a root vnode into `container` and keep it alive until
    /// [`Renderer::unmount_root`].
    pub(crate) fn mount_root(&self, mut vnode: VNode, container: HostNode) -> Result<()> {
        if self.inner.roots.lock().contains_key(&container) {
            return Err(Error::AlreadyMounted);
        }
        self.render(&mut vnode, container);
        self.inner.roots.lock().insert(container, vnode);
        Ok(())
    }

    /// Unmount the root vnode mounted into `container`.
    pub(crate) fn unmount_root(&self, container: HostNode) -> Result<()> {
        let vnode = self
            .inner
            .roots
            .lock()
            .remove(&container)
            .ok_or(Error::NotMounted)?;
        self.unmount(&vnode);
        Ok(())
    }

    /// The component instance at the root of `container`, if one is mounted.
    pub(crate) fn root_instance(&self, container: HostNode) -> Option<Arc<ComponentInstance>> {
        self.inner
            .roots
            .lock()
            .get(&container)
            .and_then(|vnode| vnode.component.clone())
    }

    /// Mount a tree into `container`.
    pub fn render(&self, vnode: &mut VNode, container: HostNode) {
        self.patch(None, vnode, container, None, None);
    }

    /// Bring the host in line with `n2`, given that it currently reflects
    /// `n1` (or nothing).
    pub fn patch(
        &self,
        n1: Option<&VNode>,
        n2: &mut VNode,
        container: HostNode,
        parent: Option<&Arc<ComponentInstance>>,
        anchor: Option<HostNode>,
    ) {
        if let Some(old) = n1 {
            if !old.same_type(n2) {
                let anchor = old.first_host_node().or(anchor);
                self.patch(None, n2, container, parent, anchor);
                self.unmount(old);
                return;
            }
        }

        match n2.shape() {
            Shape::Text => self.process_text(n1, n2, container, anchor),
            Shape::Fragment => self.process_fragment(n1, n2, container, parent, anchor),
            Shape::Element => match n1 {
                None => self.mount_element(n2, container, parent, anchor),
                Some(old) => self.patch_element(old, n2, parent),
            },
            Shape::Component => match n1 {
                None => self.mount_component(n2, container, parent, anchor),
                Some(old) => self.update_component(old, n2),
            },
        }
    }

    fn process_text(
        &self,
        n1: Option<&VNode>,
        n2: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let VNodeKind::Text(text) = &n2.kind else {
            return;
        };

        match n1 {
            None => {
                let el = self.inner.host.create_text(text);
                self.inner.host.insert(el, container, anchor);
                n2.el = Some(el);
            }
            Some(old) => {
                let Some(el) = old.el else {
                    warn!("patching a text node that has no host node");
                    return;
                };
                if let VNodeKind::Text(old_text) = &old.kind {
                    if old_text != text {
                        self.inner.host.set_text(el, text);
                    }
                }
                n2.el = Some(el);
            }
        }
    }

    fn process_fragment(
        &self,
        n1: Option<&VNode>,
        n2: &mut VNode,
        container: HostNode,
        parent: Option<&Arc<ComponentInstance>>,
        anchor: Option<HostNode>,
    ) {
        let VNodeKind::Fragment(children) = &mut n2.kind else {
            return;
        };

        match n1.map(|old| &old.kind) {
            Some(VNodeKind::Fragment(old_children)) => {
                self.patch_keyed_children(old_children, children, container, parent, anchor)
            }
            _ => self.mount_children(children, container, parent, anchor),
        }
    }

    fn mount_element(
        &self,
        vnode: &mut VNode,
        container: HostNode,
        parent: Option<&Arc<ComponentInstance>>,
        anchor: Option<HostNode>,
    ) {
        let host = &self.inner.host;
        let VNodeKind::Element {
            tag,
            props,
            children,
        } = &mut vnode.kind
        else {
            return;
        };

        let el = host.create_element(tag);
        match children {
            Children::Empty => {}
            Children::Text(text) => host.set_element_text(el, text),
            Children::List(list) => self.mount_children(list, el, parent, None),
        }
        for (key, value) in props.iter() {
            host.patch_prop(el, key, None, Some(value));
        }
        host.insert(el, container, anchor);
        vnode.el = Some(el);
    }

    fn mount_children(
        &self,
        children: &mut [VNode],
        container: HostNode,
        parent: Option<&Arc<ComponentInstance>>,
        anchor: Option<HostNode>,
    ) {
        for child in children {
            self.patch(None, child, container, parent, anchor);
        }
    }

    fn patch_element(&self, old: &VNode, n2: &mut VNode, parent: Option<&Arc<ComponentInstance>>) {
        let Some(el) = old.el else {
            warn!("patching an element that has no host node");
            return;
        };
        n2.el = Some(el);

        let (
            VNodeKind::Element {
                props: old_props,
                children: old_children,
                ..
            },
            VNodeKind::Element {
                props: new_props,
                children: new_children,
                ..
            },
        ) = (&old.kind, &mut n2.kind)
        else {
            return;
        };

        self.patch_children(old_children, new_children, el, parent);
        self.patch_props(el, old_props, new_props);
    }

    fn patch_children(
        &self,
        c1: &Children,
        c2: &mut Children,
        el: HostNode,
        parent: Option<&Arc<ComponentInstance>>,
    ) {
        let host = &self.inner.host;
        match (c1, c2) {
            (Children::List(old), Children::Text(text)) => {
                self.unmount_children(old);
                host.set_element_text(el, text);
            }
            (Children::Text(old), Children::Text(text)) => {
                if **old != **text {
                    host.set_element_text(el, text);
                }
            }
            (Children::Empty, Children::Text(text)) => host.set_element_text(el, text),
            (Children::Text(_), Children::List(list)) => {
                host.set_element_text(el, "");
                self.mount_children(list, el, parent, None);
            }
            (Children::Empty, Children::List(list)) => self.mount_children(list, el, parent, None),
            (Children::List(old), Children::List(list)) => {
                self.patch_keyed_children(old, list, el, parent, None)
            }
            (Children::List(old), Children::Empty) => self.unmount_children(old),
            (Children::Text(_), Children::Empty) => host.set_element_text(el, ""),
            (Children::Empty, Children::Empty) => {}
        }
    }

    /// Host calls only for props whose value changed or that were removed.
    fn patch_props(&self, el: HostNode, old: &Props, new: &Props) {
        let host = &self.inner.host;
        for (key, next) in new {
            let prev = old.get(key);
            if prev.map_or(true, |prev| !prev.same(next)) {
                host.patch_prop(el, key, prev, Some(next));
            }
        }
        for (key, prev) in old {
            if !new.contains_key(key) {
                host.patch_prop(el, key, Some(prev), None);
            }
        }
    }

    /// Reconcile two child lists. Window ends are exclusive.
    pub fn patch_keyed_children(
        &self,
        c1: &[VNode],
        c2: &mut [VNode],
        container: HostNode,
        parent: Option<&Arc<ComponentInstance>>,
        parent_anchor: Option<HostNode>,
    ) {
        let mut i = 0;
        let mut e1 = c1.len();
        let mut e2 = c2.len();

        // 1. Common head. Old siblings after `i` are still in place.
        while i < e1 && i < e2 && c1[i].same_type(&c2[i]) {
            let anchor = following_host_node(&c1[i + 1..]).or(parent_anchor);
            self.patch(Some(&c1[i]), &mut c2[i], container, parent, anchor);
            i += 1;
        }

        // 2. Common tail. New siblings after `e2` are already patched.
        while i < e1 && i < e2 && c1[e1 - 1].same_type(&c2[e2 - 1]) {
            let anchor = following_host_node(&c2[e2..]).or(parent_anchor);
            self.patch(Some(&c1[e1 - 1]), &mut c2[e2 - 1], container, parent, anchor);
            e1 -= 1;
            e2 -= 1;
        }

        trace!(
            head = i,
            old_window = e1 - i,
            new_window = e2 - i,
            "keyed diff trimmed"
        );

        if i == e1 {
            // 3. Only new nodes left: mount before whatever follows the window.
            let anchor = following_host_node(&c2[e2..]).or(parent_anchor);
            for child in &mut c2[i..e2] {
                self.patch(None, child, container, parent, anchor);
            }
        } else if i == e2 {
            // 4. Only old nodes left.
            for child in &c1[i..e1] {
                self.unmount(child);
            }
        } else {
            self.patch_middle_window(c1, c2, (i, e1, e2), container, parent, parent_anchor);
        }
    }

    fn patch_middle_window(
        &self,
        c1: &[VNode],
        c2: &mut [VNode],
        (start, e1, e2): (usize, usize, usize),
        container: HostNode,
        parent: Option<&Arc<ComponentInstance>>,
        parent_anchor: Option<HostNode>,
    ) {
        let to_be_patched = e2 - start;
        let mut patched = 0;

        let key_to_new_index: HashMap<Key, usize> = (start..e2)
            .filter_map(|j| c2[j].key.clone().map(|key| (key, j)))
            .collect();

        // new-relative position -> old index + 1, 0 = mount fresh
        let mut new_to_old = vec![0usize; to_be_patched];
        let mut moved = false;
        let mut max_new_index_so_far = 0;

        for (old_index, prev) in c1.iter().enumerate().take(e1).skip(start) {
            if patched >= to_be_patched {
                self.unmount(prev);
                continue;
            }

            let new_index = match &prev.key {
                Some(key) => key_to_new_index
                    .get(key)
                    .copied()
                    .filter(|&j| new_to_old[j - start] == 0),
                None => (start..e2)
                    .find(|&j| new_to_old[j - start] == 0 && prev.same_type(&c2[j])),
            };

            let Some(new_index) = new_index else {
                self.unmount(prev);
                continue;
            };

            if new_index >= max_new_index_so_far {
                max_new_index_so_far = new_index;
            } else {
                moved = true;
            }
            new_to_old[new_index - start] = old_index + 1;
            // Host nodes are still in old order here.
            let anchor = following_host_node(&c1[old_index + 1..]).or(parent_anchor);
            self.patch(Some(prev), &mut c2[new_index], container, parent, anchor);
            patched += 1;
        }

        let sequence = if moved {
            longest_increasing_subsequence(&new_to_old)
        } else {
            Vec::new()
        };
        trace!(moved, stable = sequence.len(), to_be_patched, "keyed diff middle window");

        let mut remaining = sequence.len();
        for offset in (0..to_be_patched).rev() {
            let index = start + offset;
            let anchor = following_host_node(&c2[index + 1..]).or(parent_anchor);

            if new_to_old[offset] == 0 {
                self.patch(None, &mut c2[index], container, parent, anchor);
            } else if moved {
                if remaining > 0 && sequence[remaining - 1] == offset {
                    remaining -= 1;
                } else {
                    self.move_node(&c2[index], container, anchor);
                }
            }
        }
    }

    /// Reinsert every host node `vnode` owns before `anchor`.
    fn move_node(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        for node in vnode.host_nodes() {
            self.inner.host.insert(node, container, anchor);
        }
    }

    fn mount_component(
        &self,
        vnode: &mut VNode,
        container: HostNode,
        parent: Option<&Arc<ComponentInstance>>,
        anchor: Option<HostNode>,
    ) {
        let VNodeKind::Component { def, props, slots } = &vnode.kind else {
            return;
        };

        let instance = ComponentInstance::new(def.clone(), props, slots.clone(), parent);
        debug!(component = instance.name(), id = instance.id().raw(), "mounting component");

        instance.setup();
        self.setup_render_effect(&instance, container, anchor);

        vnode.el = instance.first_host_node();
        vnode.component = Some(instance);
    }

    fn setup_render_effect(
        &self,
        instance: &Arc<ComponentInstance>,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let weak = Arc::downgrade(instance);
        let job_slot: Arc<OnceLock<Job>> = Arc::new(OnceLock::new());

        // The renderer owns the roots, so the effect must not own the renderer.
        let body = {
            let renderer: Weak<RendererInner> = Arc::downgrade(&self.inner);
            let weak = weak.clone();
            move || {
                if let (Some(inner), Some(instance)) = (renderer.upgrade(), weak.upgrade()) {
                    Renderer { inner }.run_render_pass(&instance, container, anchor);
                }
            }
        };

        let scheduler = {
            let queue = self.inner.queue.clone();
            let job_slot = job_slot.clone();
            move || {
                if let Some(job) = job_slot.get() {
                    queue.queue_job(job.clone());
                }
            }
        };

        let runner = Subscriber::new(body, EffectOptions::new().scheduler(scheduler));
        let job = Job::with_id(JobId::from(runner.id()), move || {
            if let Some(instance) = weak.upgrade() {
                instance.update();
            }
        });
        let _ = job_slot.set(job);
        let _ = instance.update.set(runner.clone());

        runner.run();
    }

    /// One pass of a component's render effect: mount on the first run,
    /// re-render and patch afterwards.
    fn run_render_pass(
        &self,
        instance: &Arc<ComponentInstance>,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        if instance.is_unmounted() {
            debug!(component = instance.name(), "skipping update of unmounted component");
            return;
        }

        if !instance.is_mounted() {
            let mut tree = instance.render();
            self.patch(None, &mut tree, container, Some(instance), anchor);
            instance.set_sub_tree(tree);
            instance.mark_mounted();
            instance.run_mounted_hooks();
        } else {
            instance.apply_next();
            let mut tree = instance.render();
            let prev = instance.take_sub_tree();
            // Siblings may have moved since mount; anchor on whatever follows
            // the current output.
            let anchor = match prev.as_ref().and_then(|tree| tree.host_nodes().last().copied()) {
                Some(last) => self.inner.host.next_sibling(last),
                None => anchor,
            };
            self.patch(prev.as_ref(), &mut tree, container, Some(instance), anchor);
            instance.set_sub_tree(tree);
            debug!(component = instance.name(), id = instance.id().raw(), "component updated");
            instance.run_updated_hooks();
        }
    }

    fn update_component(&self, old: &VNode, n2: &mut VNode) {
        let Some(instance) = old.component.clone() else {
            warn!("updating a component vnode that has no instance");
            return;
        };

        if should_update(old.props(), n2.props()) {
            if let VNodeKind::Component { props, slots, .. } = &n2.kind {
                instance.set_next(props, slots.clone());
            }
            instance.update();
        }

        n2.el = instance.first_host_node().or(old.el);
        n2.component = Some(instance);
    }

    /// Remove a vnode's host nodes and tear down its components.
    pub fn unmount(&self, vnode: &VNode) {
        match &vnode.kind {
            VNodeKind::Component { .. } => {
                if let Some(instance) = &vnode.component {
                    self.unmount_component(instance, true);
                }
            }
            VNodeKind::Fragment(children) => self.unmount_children(children),
            VNodeKind::Element { children, .. } => {
                if let Children::List(list) = children {
                    for child in list {
                        self.teardown(child);
                    }
                }
                if let Some(el) = vnode.el {
                    self.inner.host.remove(el);
                }
            }
            VNodeKind::Text(_) => {
                if let Some(el) = vnode.el {
                    self.inner.host.remove(el);
                }
            }
        }
    }

    fn unmount_children(&self, children: &[VNode]) {
        for child in children {
            self.unmount(child);
        }
    }

    fn unmount_component(&self, instance: &Arc<ComponentInstance>, remove_host_nodes: bool) {
        instance.mark_unmounted();
        if let Some(tree) = instance.take_sub_tree() {
            if remove_host_nodes {
                self.unmount(&tree);
            } else {
                self.teardown(&tree);
            }
        }
    }

    /// Stop every component below a node whose host subtree is going away
    /// with an ancestor.
    fn teardown(&self, vnode: &VNode) {
        match &vnode.kind {
            VNodeKind::Component { .. } => {
                if let Some(instance) = &vnode.component {
                    self.unmount_component(instance, false);
                }
            }
            VNodeKind::Fragment(children)
            | VNodeKind::Element {
                children: Children::List(children),
                ..
            } => {
                for child in children {
                    self.teardown(child);
                }
            }
            VNodeKind::Element { .. } | VNodeKind::Text(_) => {}
        }
    }
}

/// The first host node owned by any of `siblings`.
fn following_host_node(siblings: &[VNode]) -> Option<HostNode> {
    siblings.iter().find_map(VNode::first_host_node)
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("queue", &self.inner.queue)
            .finish()
    }
}

// ---- Tests ----
