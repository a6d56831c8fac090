//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Since each worker thread processes its requests sequentially, handlers must never block the current thread. All
//! database work and outbound calls are expressed as futures.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use farm_payment_engine::{ReconciliationApi, ReconciliationDatabase, ReconciliationOutcome};
use log::*;

use crate::{data_objects::WebhookAck, errors::ServerError, signature::WebhookVerifier};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Requests with any other method on the path get a 405.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .route(actix_web::web::route().guard(actix_web::guard::$method()).to($name::< $( [< T $bounds:camel >], )+>))
                    .default_service(actix_web::web::route().to($crate::routes::method_not_allowed));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

pub async fn method_not_allowed(req: HttpRequest) -> Result<HttpResponse, ServerError> {
    debug!("💻️ {} is not allowed on {}", req.method(), req.uri());
    Err(ServerError::MethodNotAllowed)
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(payment_webhook => Post "/payment" impl ReconciliationDatabase);
/// Route handler for processor payment notifications.
///
/// The body is taken as raw bytes, since the signature covers the exact payload. Responses follow the processor's
/// retry semantics: every reconciled outcome (including "nothing to do") is a 200, a bad signature or payload is a
/// 400 (no ledger is touched), and infrastructure failures are a 500 so that the processor redelivers.
pub async fn payment_webhook<B>(
    req: HttpRequest,
    body: web::Bytes,
    verifier: web::Data<WebhookVerifier>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
{
    trace!("🧾️ Received payment webhook ({} bytes)", body.len());
    let signature = req
        .headers()
        .get(verifier.header_name())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("🔐️ Payment webhook arrived without a readable {} header.", verifier.header_name());
            ServerError::MissingSignature
        })?;
    let event = verifier.verify(&body, signature)?;
    let event_id = event.event_id().to_string();
    let outcome = api.process_event(event).await.map_err(|e| {
        warn!("🧾️ Event {event_id} could not be processed. {e}");
        ServerError::from(e)
    })?;
    log_outcome(&event_id, &outcome);
    Ok(HttpResponse::Ok().json(WebhookAck::from(&outcome)))
}

fn log_outcome(event_id: &str, outcome: &ReconciliationOutcome) {
    match outcome {
        ReconciliationOutcome::Paid { order, side_effect_failures } if !side_effect_failures.is_empty() => warn!(
            "🧾️ Event {event_id} paid order #{} with {} failed side effects: {}",
            order.id,
            side_effect_failures.len(),
            side_effect_failures.join("; ")
        ),
        ReconciliationOutcome::OrderNotFound { payment_intent_id } => {
            warn!("🧾️ Event {event_id}: no order for {payment_intent_id}. Acknowledged with a warning.")
        },
        _ => info!("🧾️ Event {event_id} acknowledged: {}", outcome.name()),
    }
}
