#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    forum_api::rocket()
}
