use crate::route::Route;
use std::borrow::Cow;
use std::sync::Arc;

/// A group of routes sharing a path prefix and, usually, some state.
///
/// Routes receive the view as an `Arc`, so handlers can capture it:
///
/// ```rust
/// use splus::{Route, View};
/// use std::borrow::Cow;
/// use std::sync::Arc;
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl View for Greeter {
///     fn prefix(&self) -> Option<Cow<'_, str>> {
///         Some("hello".into())
///     }
///
///     fn routes(self: Arc<Self>) -> Vec<Route> {
///         vec![Route::get("/", move || async move { self.greeting.clone() })]
///     }
/// }
/// ```
pub trait View: Send + Sync + 'static {
    /// Unique name within an application. Defaults to the lower-cased type name.
    fn name(&self) -> String {
        type_name::<Self>().to_lowercase()
    }

    /// Path prefix of the view's routes. `None` uses [`View::name`].
    fn prefix(&self) -> Option<Cow<'_, str>> {
        None
    }

    fn routes(self: Arc<Self>) -> Vec<Route>;
}

/// Unqualified type name, without generic arguments.
pub(crate) fn type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A view with its routes already collected.
#[derive(Debug)]
pub(crate) struct MountedView {
    pub(crate) name: String,
    pub(crate) type_name: &'static str,
    pub(crate) prefix: String,
    pub(crate) routes: Vec<Route>,
}

impl MountedView {
    pub(crate) fn new<V: View>(view: V) -> Self {
        let name = view.name();
        let prefix = view.prefix().map_or_else(|| name.clone(), Cow::into_owned);
        let routes = Arc::new(view).routes();

        Self { name, type_name: type_name::<V>(), prefix, routes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ApiView;

    impl View for ApiView {
        fn routes(self: Arc<Self>) -> Vec<Route> {
            vec![Route::get("/random", || async { "4" })]
        }
    }

    struct Prefixed;

    impl View for Prefixed {
        fn name(&self) -> String {
            "custom".to_owned()
        }

        fn prefix(&self) -> Option<Cow<'_, str>> {
            Some("api".into())
        }

        fn routes(self: Arc<Self>) -> Vec<Route> {
            Vec::new()
        }
    }

    #[test]
    fn test_type_name_strips_path() {
        assert_eq!(type_name::<ApiView>(), "ApiView");
        assert_eq!(type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_default_name_and_prefix() {
        let mounted = MountedView::new(ApiView);

        assert_eq!(mounted.name, "apiview");
        assert_eq!(mounted.prefix, "apiview");
        assert_eq!(mounted.type_name, "ApiView");
        assert_eq!(mounted.routes.len(), 1);
    }

    #[test]
    fn test_custom_name_and_prefix() {
        let mounted = MountedView::new(Prefixed);

        assert_eq!(mounted.name, "custom");
        assert_eq!(mounted.prefix, "api");
    }
}
