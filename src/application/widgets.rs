//! Child widgets rendered inside the product list.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::error::{ClientError, FragmentFault};
use crate::presentation::views::ProductListView;

/// Named child widget; its output is concatenated into the parent's
/// `list_body` and `list_header` in configured order.
#[async_trait]
pub trait SubWidget: Send + Sync {
    fn name(&self) -> &str;

    async fn body(&self, uid: &str, view: &ProductListView) -> Result<String, FragmentFault>;

    async fn header(&self, _uid: &str, _view: &ProductListView) -> Result<String, FragmentFault> {
        Ok(String::new())
    }

    /// Handle request input before anything is rendered.
    async fn process(&self, _view: &mut ProductListView) -> Result<(), FragmentFault> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct WidgetRegistry {
    widgets: HashMap<String, Arc<dyn SubWidget>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, widget: Arc<dyn SubWidget>) {
        self.widgets.insert(widget.name().to_string(), widget);
    }

    pub fn with(mut self, widget: Arc<dyn SubWidget>) -> Self {
        self.register(widget);
        self
    }

    /// Widgets for `names` in the given order.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn SubWidget>>, ClientError> {
        names
            .iter()
            .map(|name| {
                self.widgets
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ClientError::UnknownSubWidget(name.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}
