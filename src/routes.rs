use crate::{
    api::{attendance, ledger},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Token issuance lives in the external auth provider; every route here
    // expects an already-minted bearer token.
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    .service(web::resource("/start").route(web::post().to(attendance::start)))
                    .service(web::resource("/end").route(web::post().to(attendance::end)))
                    .service(web::resource("/status").route(web::get().to(attendance::status)))
                    .service(web::resource("/history").route(web::get().to(attendance::history)))
                    .service(web::resource("/all").route(web::get().to(attendance::all))),
            )
            .service(
                web::scope("/ledgers")
                    // /ledgers
                    .service(
                        web::resource("")
                            .route(web::get().to(ledger::list))
                            .route(web::post().to(ledger::create)),
                    )
                    // /ledgers/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(ledger::get))
                            .route(web::put().to(ledger::update_status))
                            .route(web::delete().to(ledger::delete)),
                    )
                    // /ledgers/{id}/upload
                    .service(web::resource("/{id}/upload").route(web::post().to(ledger::upload)))
                    // /ledgers/{id}/download
                    .service(
                        web::resource("/{id}/download").route(web::get().to(ledger::download)),
                    ),
            ),
    );
}
