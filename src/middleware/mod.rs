/*
 * Responsibility
 * - middleware public interface
 * - authz: request gate (policy evaluation + principal publishing)
 * - http: cross-cutting transport layers
 */
pub mod authz;
pub mod http;
