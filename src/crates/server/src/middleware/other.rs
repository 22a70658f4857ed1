use actix_cors::Cors;

/// 店内的点歌网页与收银台都会跨域调用队列接口
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "HEAD"])
        .allow_any_header()
        .max_age(3600)
}
