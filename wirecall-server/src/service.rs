//! Service dispatch.
//!
//! A [`Service`] is a set of named methods built at registration time.
//! Each method is an async function whose parameters implement
//! `Deserialize` and whose result is `Result<R, E>` with `R: Serialize`
//! and `E: Display`:
//!
//! ```ignore
//! let service = Service::new()
//!     .method("Echo", |message: String| async move { Ok::<_, String>(message) })
//!     .method("Add", |a: i64, b: i64| async move { Ok::<_, String>(a + b) });
//! ```
//!
//! Wire arguments are converted positionally to the declared parameter
//! types. A [`ServiceMap`] routes a request by service and method name and
//! turns a panicking method into an [`InvokeError::Panicked`].

use crate::error::InvokeError;
use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Future returned by a method invocation.
pub type InvokeFuture = BoxFuture<'static, Result<Value, InvokeError>>;

/// An async function callable with positional wire arguments.
///
/// Implemented for closures and functions of up to four parameters;
/// `Args` is the tuple of parameter types.
pub trait Handler<Args>: Send + Sync + 'static {
    fn call(&self, args: Vec<Value>) -> InvokeFuture;
}

fn convert_arg<T: DeserializeOwned>(value: Value, index: &mut usize) -> Result<T, InvokeError> {
    let at = *index;
    *index += 1;
    serde_json::from_value(value).map_err(|source| InvokeError::InvalidArgument { index: at, source })
}

macro_rules! impl_handler {
    ($arity:expr; $($ty:ident),*) => {
        impl<F, Fut, R, E, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<R, E>> + Send + 'static,
            R: Serialize + Send + 'static,
            E: fmt::Display + Send + 'static,
            $($ty: DeserializeOwned + Send + 'static,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, args: Vec<Value>) -> InvokeFuture {
                let converted = (move || -> Result<($($ty,)*), InvokeError> {
                    let [$($ty),*]: [Value; $arity] =
                        args.try_into().map_err(|args: Vec<Value>| InvokeError::ArgumentCount {
                            expected: $arity,
                            actual: args.len(),
                        })?;
                    let mut index = 0;
                    $(
                        let $ty = convert_arg::<$ty>($ty, &mut index)?;
                    )*
                    Ok(($($ty,)*))
                })();
                let ($($ty,)*) = match converted {
                    Ok(values) => values,
                    Err(e) => return future::ready(Err(e)).boxed(),
                };

                let fut = (self)($($ty),*);
                async move {
                    let output = fut.await.map_err(|e| InvokeError::Method(e.to_string()))?;
                    serde_json::to_value(output).map_err(InvokeError::Result)
                }
                .boxed()
            }
        }
    };
}

impl_handler!(0;);
impl_handler!(1; A1);
impl_handler!(2; A1, A2);
impl_handler!(3; A1, A2, A3);
impl_handler!(4; A1, A2, A3, A4);

/// Object-safe form of [`Handler`] with the argument tuple erased.
trait Method: Send + Sync {
    fn invoke(&self, args: Vec<Value>) -> InvokeFuture;
}

struct MethodFn<H, Args> {
    handler: H,
    _args: PhantomData<fn() -> Args>,
}

impl<H, Args> Method for MethodFn<H, Args>
where
    H: Handler<Args>,
    Args: 'static,
{
    fn invoke(&self, args: Vec<Value>) -> InvokeFuture {
        self.handler.call(args)
    }
}

/// A named set of methods.
#[derive(Clone, Default)]
pub struct Service {
    methods: HashMap<String, Arc<dyn Method>>,
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a method. A later method with the same name replaces the earlier one.
    pub fn method<H, Args>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<Args>,
        Args: 'static,
    {
        self.methods.insert(
            name.into(),
            Arc::new(MethodFn {
                handler,
                _args: PhantomData,
            }),
        );
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Dispatch table keyed by service name.
#[derive(Debug, Clone, Default)]
pub struct ServiceMap {
    services: HashMap<String, Service>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, service: Service) -> Option<Service> {
        self.services.insert(name.into(), service)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// Service names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Invokes `service.method(args)`.
    ///
    /// The whole invocation, argument conversion included, runs behind a
    /// panic guard.
    pub async fn dispatch(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, InvokeError> {
        let svc = self
            .services
            .get(service)
            .ok_or_else(|| InvokeError::NoService(service.to_string()))?;
        let target = svc
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| InvokeError::NoMethod {
                service: service.to_string(),
                method: method.to_string(),
            })?;

        match AssertUnwindSafe(async move { target.invoke(args).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(InvokeError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
