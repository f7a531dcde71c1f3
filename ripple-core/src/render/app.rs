//! Application entry point.
//!
//! The renderer keeps a mounted root alive, so an [`App`] can be dropped right
//! after [`App::mount`] and the tree stays reactive until
//! [`App::unmount`] runs on it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::component::{Component, ComponentInstance};
use super::host::HostNode;
use super::renderer::Renderer;
use super::vnode::{Props, VNode};
use crate::error::{Error, Result};
use crate::reactive::{Key, Value};

/// A root component bound to a renderer.
pub struct App {
    renderer: Renderer,
    root: Arc<Component>,
    props: Props,
    container: Mutex<Option<HostNode>>,
}

impl App {
    pub(crate) fn new(renderer: Renderer, root: Arc<Component>) -> Self {
        Self {
            renderer,
            root,
            props: Props::new(),
            container: Mutex::new(None),
        }
    }

    /// Props passed to the root component.
    pub fn with_prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(Key::from(key), value.into());
        self
    }

    /// Render the root component into `container`.
    ///
    /// Fails with [`Error::AlreadyMounted`] when this app, or another app on
    /// the same renderer, is already mounted there.
    pub fn mount(&self, container: HostNode) -> Result<()> {
        if self.container.lock().is_some() {
            return Err(Error::AlreadyMounted);
        }

        debug!(component = self.root.name(), container = ?container, "mounting app");
        let vnode = VNode::component(self.root.clone()).with_props(self.props.clone());
        self.renderer.mount_root(vnode, container)?;
        *self.container.lock() = Some(container);
        Ok(())
    }

    /// Tear the app down, removing everything it rendered.
    pub fn unmount(&self) -> Result<()> {
        let container = self.container.lock().take().ok_or(Error::NotMounted)?;
        self.renderer.unmount_root(container)?;
        debug!(component = self.root.name(), "app unmounted");
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.container.lock().is_some()
    }

    /// The root component instance, while mounted.
    pub fn root_instance(&self) -> Option<Arc<ComponentInstance>> {
        let container = (*self.container.lock())?;
        self.renderer.root_instance(container)
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("root", &self.root.name())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
