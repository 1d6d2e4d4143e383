// Biblioteca raíz del crate `cuadernillo`.
// Reexporta los módulos principales; el binario sólo arranca el servidor.
pub mod admin;
pub mod almacen;
pub mod api_json;
pub mod catalogo;
pub mod config;
pub mod debounce;
pub mod error;
pub mod registro;
pub mod seleccion;
pub mod server;
pub mod sesion;

pub use catalogo::{normalizar, Catalogo, Zona};
pub use config::{BackendRemoto, Config};
pub use error::{CuadernilloError, Resultado};
pub use seleccion::{calcular_candidatos, Nivel, Seleccion, TipoCentro};
pub use server::{run_server, EstadoApp};
pub use sesion::{ContextoSesion, SeleccionActual};
